use thiserror::Error;

pub type SkykitResult<T> = Result<T, SkykitError>;

#[derive(Debug, Error)]
pub enum SkykitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid metadata: {0}")]
    Metadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
