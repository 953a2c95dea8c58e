//! Seed documents for the in-memory store, read from YAML or JSON.
//!
//! ```yaml
//! tours:
//!   - id: tour-forest-hiker
//!     name: The Forest Hiker
//! users:
//!   - id: user-admin
//!     role: admin
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::resource::ResourceRegistry;
use crate::store::{MemoryStore, StoreError};
use crate::types::Document;

/// Collection name to its documents
pub type SeedData = BTreeMap<String, Vec<Document>>;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON seed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML seed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn parse_seed(text: &str, json: bool) -> Result<SeedData, SeedError> {
    if json {
        Ok(serde_json::from_str(text)?)
    } else {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Read a seed file; `.json` files are JSON, anything else YAML
pub fn load_seed(path: &Path) -> Result<SeedData, SeedError> {
    let text = std::fs::read_to_string(path)?;
    let json = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    parse_seed(&text, json)
}

/// Insert seed documents, filling schema defaults for registered resources.
/// Returns the number of documents inserted.
pub async fn apply_seed(store: &MemoryStore, registry: &ResourceRegistry, data: SeedData) -> Result<usize, SeedError> {
    let mut total = 0;
    for (collection, mut docs) in data {
        match registry.iter().find(|d| d.collection == collection) {
            Some(descriptor) => docs.iter_mut().for_each(|doc| descriptor.schema.fill_defaults(doc)),
            None => tracing::warn!("Seeding '{}', which no resource serves", collection),
        }
        total += store.seed(&collection, docs).await?;
    }
    Ok(total)
}
