use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid log entry: {0}")]
    InvalidLog(String),

    #[error("duplicate identifier: {0}")]
    DuplicateId(uuid::Uuid),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
