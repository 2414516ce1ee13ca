use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity, pool exhaustion or a malformed query. Passed through untouched.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The view returned a row that does not fit the expected shape.
    #[error("malformed row from {view}: {source}")]
    Decode {
        view: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{view} unavailable: {reason}")]
    Unavailable { view: &'static str, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
