use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: storage error: {0}")]
    Storage(String),

    #[error("store: serialization error: {0}")]
    Serialization(String),

    #[error("store: malformed vector for {id}: {reason}")]
    MalformedVector { id: String, reason: String },

    #[error("store: invalid key component {0:?}")]
    InvalidKey(String),
}

pub(crate) fn storage<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Storage(e.to_string())
}
