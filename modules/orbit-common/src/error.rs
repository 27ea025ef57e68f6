use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrbitError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
