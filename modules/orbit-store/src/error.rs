use thiserror::Error;

use orbit_common::OrbitError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for OrbitError {
    fn from(e: StoreError) -> Self {
        OrbitError::Storage(e.to_string())
    }
}
