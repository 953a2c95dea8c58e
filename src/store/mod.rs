pub mod memory;
pub mod postgres;
pub mod sql;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::query::QuerySpec;
use crate::types::Document;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call exceeded deadline of {0}ms")]
    Timeout(u64),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Transient failures are worth retrying; everything else is fatal for the request
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => true,
            StoreError::Sqlx(e) => matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document persistence. Every operation is scoped to a named collection and
/// is atomic per document; nothing here coordinates across documents.
#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Documents matching the query's filter, ordered, paginated and projected
    async fn find(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Persist a new document; the store assigns `id` and the version field
    async fn create(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    /// Shallow-merge `patch` into the stored document and bump its version
    async fn update_by_id(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Option<Document>>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Bound a store call by `deadline`. Expiry is a transient `Timeout`, never a
/// missing document.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Store call timed out after {:?}", deadline);
            Err(StoreError::Timeout(deadline.as_millis() as u64))
        }
    }
}

/// Collection names end up as table names; keep them to plain identifiers
pub fn validate_collection(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidCollection(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_are_identifiers() {
        assert!(validate_collection("tours").is_ok());
        assert!(validate_collection("tour_reviews").is_ok());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("tours; drop table users").is_err());
        assert!(validate_collection("9lives").is_err());
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_transient_timeout() {
        let result: StoreResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(10)));
        assert!(err.is_transient());
    }
}
