//! CRUD behaviour for any resource, driven by its descriptor.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Principal;
use crate::config::AppConfig;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult, Gate};
use crate::query::evaluate::matches;
use crate::query::{Filter, QuerySpec, RawQuery};
use crate::resource::{Expander, Expansion, ResourceDescriptor};
use crate::store::{with_deadline, ResourceStore};
use crate::types::{Document, Operation, ID_FIELD};

pub struct ResourceHandlers {
    descriptor: Arc<ResourceDescriptor>,
    store: Arc<dyn ResourceStore>,
    config: Arc<AppConfig>,
}

impl ResourceHandlers {
    pub fn new(descriptor: Arc<ResourceDescriptor>, store: Arc<dyn ResourceStore>, config: Arc<AppConfig>) -> Self {
        Self { descriptor, store, config }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.config.store.deadline_ms)
    }

    /// What the access-control chain needs for this resource's requests
    pub fn gate(&self) -> Gate<'_> {
        Gate {
            store: self.store.as_ref(),
            security: &self.config.security,
            deadline: self.deadline(),
        }
    }

    fn expander(&self) -> Expander<'_> {
        Expander::new(self.store.as_ref(), self.deadline(), self.config.query.max_limit)
    }

    fn not_found(&self) -> ApiError {
        ApiError::not_found(format!("No {} found with that ID", self.descriptor.singular))
    }

    /// True when the descriptor's default predicate hides `doc`
    fn is_hidden(&self, doc: &Document) -> bool {
        self.descriptor
            .default_predicate
            .as_ref()
            .map_or(false, |predicate| !matches(predicate, doc))
    }

    /// The `QuerySpec` a list request runs with
    pub fn list_spec(&self, raw: RawQuery, structural: Option<&Filter>) -> QuerySpec {
        let mut pipeline = self.descriptor.pipeline(raw, self.config.query.max_limit).all();
        if let Some(predicate) = &self.descriptor.default_predicate {
            pipeline = pipeline.structural(predicate);
        }
        if let Some(structural) = structural {
            pipeline = pipeline.structural(structural);
        }
        let spec = pipeline.build();

        if self.config.query.debug_logging {
            tracing::debug!("{} query: {:?}", self.descriptor.name, spec);
        }
        spec
    }

    /// List documents matching the caller's query, narrowed by the structural filter
    pub async fn get_all(&self, raw: RawQuery, structural: Option<&Filter>) -> ApiResult<Value> {
        let spec = self.list_spec(raw, structural);
        let docs = with_deadline(self.deadline(), self.store.find(self.descriptor.collection, &spec)).await?;
        let docs = self.expander().expand_all(docs, &self.descriptor.default_expansion).await?;

        let items = docs
            .into_iter()
            .map(|mut doc| {
                self.descriptor.add_computed(&mut doc);
                Value::Object(doc)
            })
            .collect::<Vec<_>>();

        tracing::debug!("Listed {} {}", items.len(), self.descriptor.name);
        Ok(ApiResponse::list(self.descriptor.name, items))
    }

    /// List the children of one parent document
    pub async fn get_all_nested(&self, parent_id: &str, raw: RawQuery) -> ApiResult<Value> {
        let nested = self
            .descriptor
            .nested
            .as_ref()
            .ok_or_else(|| ApiError::internal(format!("{} is not a nested resource", self.descriptor.name)))?;
        self.get_all(raw, Some(&Filter::eq(nested.parent_field, parent_id))).await
    }

    async fn load(&self, id: &str) -> Result<Document, ApiError> {
        let doc = with_deadline(self.deadline(), self.store.find_by_id(self.descriptor.collection, id))
            .await?
            .ok_or_else(|| self.not_found())?;
        if self.is_hidden(&doc) {
            return Err(self.not_found());
        }
        Ok(doc)
    }

    pub async fn get_one(&self, id: &str) -> ApiResult<Value> {
        let doc = self.descriptor.present(self.load(id).await?);

        let expansions: Vec<Expansion> = self
            .descriptor
            .default_expansion
            .iter()
            .chain(&self.descriptor.single_expansion)
            .cloned()
            .collect();
        let doc = self.expander().expand(doc, &expansions).await?;

        Ok(ApiResponse::keyed(self.descriptor.singular, doc))
    }

    /// The caller's own document
    pub async fn get_me(&self, principal: &Principal) -> ApiResult<Value> {
        self.get_one(&principal.id).await
    }

    pub async fn create_one(&self, payload: Document) -> ApiResult<Value> {
        let schema = &self.descriptor.schema;
        let doc = schema.prepare(payload, Operation::Create);
        schema.check(&doc, None)?;
        self.ensure_unique(&doc, None).await?;

        let created = with_deadline(self.deadline(), self.store.create(self.descriptor.collection, doc)).await?;
        tracing::info!(
            "Created {} {}",
            self.descriptor.singular,
            created.get(ID_FIELD).and_then(serde_json::Value::as_str).unwrap_or("?")
        );

        let created = self.descriptor.present(created);
        Ok(ApiResponse::created(keyed(self.descriptor.singular, created)))
    }

    /// Apply a partial update. Only the fields in the patch are validated,
    /// against the document as it will look after the merge.
    pub async fn update_one(&self, id: &str, patch: Document) -> ApiResult<Value> {
        let existing = self.load(id).await?;
        let schema = &self.descriptor.schema;
        let patch = schema.prepare(patch, Operation::Update);

        let changed: BTreeSet<String> = patch.keys().cloned().collect();
        let mut merged = existing;
        merged.extend(patch.clone());
        schema.check(&merged, Some(&changed))?;
        self.ensure_unique(&patch, Some(id)).await?;

        let updated = with_deadline(self.deadline(), self.store.update_by_id(self.descriptor.collection, id, patch))
            .await?
            .ok_or_else(|| self.not_found())?;
        tracing::info!("Updated {} {} ({} fields)", self.descriptor.singular, id, changed.len());

        let updated = self.descriptor.present(updated);
        let updated = self.expander().expand(updated, &self.descriptor.default_expansion).await?;
        Ok(ApiResponse::keyed(self.descriptor.singular, updated))
    }

    pub async fn delete_one(&self, id: &str) -> ApiResult<()> {
        if self.descriptor.default_predicate.is_some() {
            self.load(id).await?;
        }

        let deleted = with_deadline(self.deadline(), self.store.delete_by_id(self.descriptor.collection, id)).await?;
        if !deleted {
            return Err(self.not_found());
        }
        tracing::info!("Deleted {} {}", self.descriptor.singular, id);
        Ok(ApiResponse::<()>::no_content())
    }

    /// Reject values already taken by another document on fields declared unique
    async fn ensure_unique(&self, doc: &Document, own_id: Option<&str>) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        for field in self.descriptor.schema.unique_fields() {
            let Some(value) = doc.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let spec = QuerySpec::scoped(Filter::eq(field, value.clone()), vec![], 2);
            let taken = with_deadline(self.deadline(), self.store.find(self.descriptor.collection, &spec))
                .await?
                .iter()
                .any(|other| other.get(ID_FIELD).and_then(Value::as_str) != own_id);
            if taken {
                errors.insert(
                    field.to_string(),
                    format!("Duplicate field value: {}. Please use another value!", value),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            let joined = errors.values().cloned().collect::<Vec<_>>().join(". ");
            Err(ApiError::validation_error(format!("Invalid input data. {}", joined), errors))
        }
    }
}

fn keyed(key: &str, doc: Document) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), Value::Object(doc));
    Value::Object(data)
}
