use futures::future::{join_all, try_join_all};
use serde_json::Value;
use std::time::Duration;

use crate::query::{Filter, Projection, QuerySpec, SortField};
use crate::store::{with_deadline, ResourceStore, StoreResult};
use crate::types::{Document, ID_FIELD};

/// A read-time replacement of references with the referenced documents
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// `field` holds an id or a list of ids in `target`
    Reference {
        field: &'static str,
        target: &'static str,
        projection: Projection,
    },
    /// Attach `name`: the documents of `target` whose `foreign_field` is this document's id
    Virtual {
        name: &'static str,
        target: &'static str,
        foreign_field: &'static str,
        projection: Projection,
    },
}

impl Expansion {
    pub fn reference(field: &'static str, target: &'static str, projection: Projection) -> Self {
        Expansion::Reference { field, target, projection }
    }

    pub fn virtual_list(name: &'static str, target: &'static str, foreign_field: &'static str) -> Self {
        Expansion::Virtual {
            name,
            target,
            foreign_field,
            projection: Projection::default(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Expansion::Reference { field, .. } => field,
            Expansion::Virtual { name, .. } => name,
        }
    }
}

/// Runs expansions against a store, each lookup bounded by the deadline
pub struct Expander<'a> {
    store: &'a dyn ResourceStore,
    deadline: Duration,
    /// Upper bound on documents attached by one virtual expansion
    max_related: u64,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a dyn ResourceStore, deadline: Duration, max_related: u64) -> Self {
        Self { store, deadline, max_related }
    }

    /// Expand one document. Expansions run concurrently; each writes its own field.
    pub async fn expand(&self, mut doc: Document, expansions: &[Expansion]) -> StoreResult<Document> {
        if expansions.is_empty() {
            return Ok(doc);
        }

        let lookups = expansions.iter().map(|e| self.resolve(&doc, e));
        let resolved = try_join_all(lookups).await?;

        for (field, value) in resolved.into_iter().flatten() {
            doc.insert(field.to_string(), value);
        }
        Ok(doc)
    }

    pub async fn expand_all(&self, docs: Vec<Document>, expansions: &[Expansion]) -> StoreResult<Vec<Document>> {
        if expansions.is_empty() {
            return Ok(docs);
        }
        try_join_all(docs.into_iter().map(|doc| self.expand(doc, expansions))).await
    }

    /// Value to write for one expansion, or `None` when the document has
    /// nothing to expand (field absent, or projected away)
    async fn resolve(&self, doc: &Document, expansion: &Expansion) -> StoreResult<Option<(&'static str, Value)>> {
        match expansion {
            Expansion::Reference { field, target, projection } => {
                let value = match doc.get(*field) {
                    Some(Value::String(id)) => self
                        .fetch(target, id, projection)
                        .await?
                        .map_or(Value::Null, Value::Object),
                    Some(Value::Array(ids)) => {
                        let fetches = ids.iter().filter_map(Value::as_str).map(|id| self.fetch(target, id, projection));
                        let found = join_all(fetches)
                            .await
                            .into_iter()
                            .collect::<StoreResult<Vec<_>>>()?;
                        Value::Array(found.into_iter().flatten().map(Value::Object).collect())
                    }
                    _ => return Ok(None),
                };
                Ok(Some((*field, value)))
            }
            Expansion::Virtual { name, target, foreign_field, projection } => {
                let Some(id) = doc.get(ID_FIELD).and_then(Value::as_str) else {
                    return Ok(None);
                };
                let spec = QuerySpec::scoped(
                    Filter::eq(*foreign_field, id),
                    vec![SortField::asc(ID_FIELD)],
                    self.max_related,
                );
                let related = with_deadline(self.deadline, self.store.find(target, &spec)).await?;
                let related = related
                    .into_iter()
                    .map(|mut d| {
                        projection.apply(&mut d);
                        Value::Object(d)
                    })
                    .collect();
                Ok(Some((*name, Value::Array(related))))
            }
        }
    }

    async fn fetch(&self, target: &str, id: &str, projection: &Projection) -> StoreResult<Option<Document>> {
        let found = with_deadline(self.deadline, self.store.find_by_id(target, id)).await?;
        Ok(found.map(|mut d| {
            projection.apply(&mut d);
            d
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                "users",
                vec![
                    doc(json!({"id": "g-1", "name": "Lead", "passwordChangedAt": "2024-01-01T00:00:00Z"})),
                    doc(json!({"id": "g-2", "name": "Second"})),
                ],
            )
            .await
            .unwrap();
        store
            .seed(
                "reviews",
                vec![
                    doc(json!({"id": "r-1", "tour": "t-1", "review": "Loved it"})),
                    doc(json!({"id": "r-2", "tour": "t-2", "review": "Meh"})),
                    doc(json!({"id": "r-3", "tour": "t-1", "review": "Again!"})),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn references_are_replaced_and_missing_ones_dropped() {
        let store = store().await;
        let expander = Expander::new(&store, Duration::from_secs(1), 100);
        let guides = Expansion::reference("guides", "users", Projection::exclude(["__v", "passwordChangedAt"]));

        let tour = expander
            .expand(doc(json!({"id": "t-1", "guides": ["g-1", "missing", "g-2"]})), &[guides])
            .await
            .unwrap();
        let guides = tour["guides"].as_array().unwrap();
        assert_eq!(guides.len(), 2);
        assert_eq!(guides[0]["name"], "Lead");
        assert!(guides[0].get("passwordChangedAt").is_none());
    }

    #[tokio::test]
    async fn single_reference_becomes_null_when_missing() {
        let store = store().await;
        let expander = Expander::new(&store, Duration::from_secs(1), 100);
        let user = Expansion::reference("user", "users", Projection::include(["name"]));

        let review = expander.expand(doc(json!({"id": "r", "user": "g-2"})), &[user.clone()]).await.unwrap();
        assert_eq!(review["user"], json!({"id": "g-2", "name": "Second"}));

        let review = expander.expand(doc(json!({"id": "r", "user": "gone"})), &[user]).await.unwrap();
        assert_eq!(review["user"], Value::Null);
    }

    #[tokio::test]
    async fn virtual_attaches_related_documents() {
        let store = store().await;
        let expander = Expander::new(&store, Duration::from_secs(1), 100);
        let reviews = Expansion::virtual_list("reviews", "reviews", "tour");

        let tour = expander.expand(doc(json!({"id": "t-1"})), &[reviews]).await.unwrap();
        let ids: Vec<_> = tour["reviews"].as_array().unwrap().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("r-1"), json!("r-3")]);
    }

    #[tokio::test]
    async fn absent_fields_are_left_alone() {
        let store = store().await;
        let expander = Expander::new(&store, Duration::from_secs(1), 100);
        let guides = Expansion::reference("guides", "users", Projection::default());
        let tour = expander.expand(doc(json!({"id": "t-1", "name": "x"})), &[guides]).await.unwrap();
        assert!(tour.get("guides").is_none());
    }
}
