//! Error types.

use std::io;
use std::num::ParseFloatError;

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(String),

    #[cfg(feature = "yaml")]
    #[error("yaml deserialization error: {0}")]
    YamlDeserError(#[from] serde_yaml::Error),
    #[error("toml deserialization error: {0}")]
    TomlDeserError(#[from] toml::de::Error),
    #[error("unsupported file format: {0}")]
    UnsupportedFileFormat(String),

    #[error("failed parsing float: {0}")]
    ParseFloatError(#[from] ParseFloatError),
    #[error("failed parsing value \"{0}\" in column \"{1}\"")]
    InvalidValue(String, String),

    #[error("table {0}: missing required column \"{1}\"")]
    MissingColumn(String, String),
    #[error("table {0}: row {1} has {2} cells, expected {3}")]
    RaggedRow(String, usize, usize, usize),
    #[error("table {0}: missing value in required column \"{1}\" (row {2})")]
    MissingValue(String, String, usize),
    #[error("tables can't be concatenated, columns differ: {0}")]
    TableMismatch(String),

    #[error("invalid problem: {0}")]
    InvalidProblem(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("duplicated id: {0}")]
    DuplicateId(String),
    #[error("unknown observable: {}{}", .0, suggestion(.1))]
    UnknownObservable(String, Option<String>),
    #[error("unknown condition: {}{}", .0, suggestion(.1))]
    UnknownCondition(String, Option<String>),
    #[error("unknown parameter: {}{}", .0, suggestion(.1))]
    UnknownParameter(String, Option<String>),
    #[error("measurement row {0}: no value given for {1}")]
    MissingPlaceholderValue(usize, String),
    #[error("condition {0}: unknown override target: {1}")]
    UnknownOverrideTarget(String, String),

    #[error("failed parsing expression \"{0}\": {1}")]
    ExpressionParseError(String, String),
    #[error("failed evaluating expression \"{0}\": {1}")]
    ExpressionEvalError(String, String),

    #[error("integration failed at t={0}: {1}")]
    IntegrationError(f64, String),
    #[error("steady state not reached before t={0}")]
    SteadyStateNotReached(f64),
    #[error("invalid measurement time: {0}")]
    InvalidTime(String),

    #[error("invalid noise for observable {0}: {1}")]
    InvalidNoise(String, String),

    #[error("other error: {0}")]
    Other(String),
}

fn suggestion(similar: &Option<String>) -> String {
    match similar {
        Some(s) => format!(" (did you mean \"{}\"?)", s),
        None => String::new(),
    }
}
