use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Write to {collection}/{id} conflicts with an existing record")]
    Conflict { collection: String, id: String },

    #[error("Malformed record in {collection}: {reason}")]
    Malformed { collection: String, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(collection: &str, id: &str) -> Self {
        StoreError::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn malformed(collection: &str, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }
}
