use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReliabilityError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("invalid {0}: {1}")]
    Parameter(&'static str, String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("presence table line {line}: {reason}")]
    Table { line: usize, reason: String },
}
