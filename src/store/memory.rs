//! In-memory store used for development, seeding and tests.
//!
//! Collections keep insertion order so equal sort keys stay stable.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{validate_collection, ResourceStore, StoreResult};
use crate::query::evaluate::{compare_documents, matches};
use crate::query::QuerySpec;
use crate::types::{Document, ID_FIELD, VERSION_FIELD};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert documents as given, keeping their ids when present
    pub async fn seed(&self, collection: &str, docs: Vec<Document>) -> StoreResult<usize> {
        validate_collection(collection)?;
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        let count = docs.len();
        for mut doc in docs {
            if !doc.get(ID_FIELD).map_or(false, Value::is_string) {
                doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
            }
            doc.entry(VERSION_FIELD.to_string()).or_insert(Value::from(0));
            entries.push(doc);
        }
        tracing::info!("Seeded {} documents into '{}'", count, collection);
        Ok(count)
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map_or(0, Vec::len)
    }
}

fn id_of(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn find(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<Document>> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(vec![]);
        };

        let mut hits: Vec<&Document> = docs.iter().filter(|doc| matches(spec.filter(), doc)).collect();
        hits.sort_by(|a, b| compare_documents(spec.sort(), a, b));

        let skip = usize::try_from(spec.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(spec.limit()).unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| {
                let mut doc = doc.clone();
                spec.projection().apply(&mut doc);
                doc
            })
            .collect())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| id_of(doc) == Some(id)))
            .cloned())
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        validate_collection(collection)?;
        doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        doc.insert(VERSION_FIELD.to_string(), Value::from(0));

        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(doc.clone());
        Ok(doc)
    }

    async fn update_by_id(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Option<Document>> {
        validate_collection(collection)?;
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| id_of(doc) == Some(id)))
        else {
            return Ok(None);
        };

        for (key, value) in patch {
            if key != ID_FIELD && key != VERSION_FIELD {
                doc.insert(key, value);
            }
        }
        let version = doc.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0);
        doc.insert(VERSION_FIELD.to_string(), Value::from(version + 1));
        Ok(Some(doc.clone()))
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool> {
        validate_collection(collection)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|doc| id_of(doc) != Some(id));
        Ok(docs.len() < before)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
