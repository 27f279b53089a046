use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("geozero error: {0}")]
    Geozero(#[from] geozero::error::GeozeroError),

    #[error("invalid EWKB: {0}")]
    InvalidEwkb(&'static str),

    #[error("couldn't find spatial column {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("couldn't find SRID for {table}.{column}")]
    SridNotFound { table: String, column: String },

    #[error("couldn't convert SRID for {table}.{column} from {from} to {to}")]
    SridConversion {
        table: String,
        column: String,
        from: i32,
        to: i32,
    },

    #[error("invalid spatial relationship {name:?}, expected one of {expected:?}")]
    UnknownRelationship { name: String, expected: Vec<String> },

    #[error("unknown spatial measurement {0:?}")]
    UnknownMeasurement(String),

    #[error("wrong number of arguments ({got} for {min}-{max})")]
    ArgumentCount { got: usize, min: usize, max: usize },

    #[error("invalid spatial association options: {0}")]
    IncompatibleAssociationOptions(&'static str),

    #[error("unsupported spatial extension version: {0:?}")]
    UnsupportedVersion(String),

    #[error("invalid output format: {0:?}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, SpatialError>;
