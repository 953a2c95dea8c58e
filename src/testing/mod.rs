//! Fixtures shared by unit and integration tests: a small seeded catalogue,
//! token helpers and a store that answers slowly.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{generate_jwt, Claims};
use crate::config::SecurityConfig;
use crate::query::QuerySpec;
use crate::resource::ResourceRegistry;
use crate::seed::{apply_seed, SeedData};
use crate::store::{MemoryStore, ResourceStore, StoreResult};
use crate::types::Document;

pub const ADMIN: &str = "user-admin";
pub const LEAD_GUIDE: &str = "user-lead";
pub const GUIDE: &str = "user-guide";
pub const USER: &str = "user-laura";
/// Changed their password ten minutes before the fixtures were built
pub const MOVED_ON: &str = "user-moved-on";
pub const INACTIVE: &str = "user-inactive";

fn documents(value: Value) -> Vec<Document> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(|v| v.as_object().cloned()).collect(),
        _ => vec![],
    }
}

/// Seven tours (one secret), three reviews and six users
pub fn fixture_data() -> SeedData {
    let changed = (Utc::now() - ChronoDuration::minutes(10)).to_rfc3339();
    let mut data = SeedData::new();

    data.insert(
        "users".into(),
        documents(json!([
            {"id": ADMIN, "name": "Jonas Schmedtmann", "email": "admin@natours.io", "role": "admin"},
            {"id": LEAD_GUIDE, "name": "Leo Gillespie", "email": "leo@example.com", "role": "lead-guide",
             "passwordChangedAt": "2020-01-01T00:00:00Z"},
            {"id": GUIDE, "name": "Jennifer Hardy", "email": "jennifer@example.com", "role": "guide"},
            {"id": USER, "name": "Laura Wilson", "email": "laura@example.com", "role": "user"},
            {"id": MOVED_ON, "name": "Ben Hadley", "email": "ben@example.com", "role": "user",
             "passwordChangedAt": changed},
            {"id": INACTIVE, "name": "Kate Morrison", "email": "kate@example.com", "role": "user", "active": false},
        ])),
    );

    data.insert(
        "tours".into(),
        documents(json!([
            {"id": "tour-forest-hiker", "name": "The Forest Hiker", "duration": 5, "difficulty": "easy",
             "price": 397, "ratingsAverage": 4.8, "guides": [LEAD_GUIDE, GUIDE], "createdAt": "2024-01-01T00:00:00.000Z"},
            {"id": "tour-sea-explorer", "name": "The Sea Explorer", "duration": 7, "difficulty": "medium",
             "price": 497, "ratingsAverage": 4.7, "guides": [GUIDE], "createdAt": "2024-01-02T00:00:00.000Z"},
            {"id": "tour-snow-adventurer", "name": "The Snow Adventurer", "duration": 4, "difficulty": "difficult",
             "price": 997, "ratingsAverage": 4.5, "createdAt": "2024-01-03T00:00:00.000Z"},
            {"id": "tour-city-wanderer", "name": "The City Wanderer", "duration": 9, "difficulty": "easy",
             "price": 1197, "ratingsAverage": 4.6, "createdAt": "2024-01-04T00:00:00.000Z"},
            {"id": "tour-park-camper", "name": "The Park Camper", "duration": 10, "difficulty": "medium",
             "price": 1497, "ratingsAverage": 4.9, "createdAt": "2024-01-05T00:00:00.000Z"},
            {"id": "tour-sports-lover", "name": "The Sports Lover", "duration": 14, "difficulty": "difficult",
             "price": 2997, "ratingsAverage": 4.7, "createdAt": "2024-01-06T00:00:00.000Z"},
            {"id": "tour-secret", "name": "The Secret Garden", "duration": 3, "difficulty": "easy",
             "price": 600, "ratingsAverage": 5.0, "secretTour": true, "createdAt": "2024-01-07T00:00:00.000Z"},
        ])),
    );

    data.insert(
        "reviews".into(),
        documents(json!([
            {"id": "review-1", "review": "Loved every minute", "rating": 5, "tour": "tour-forest-hiker", "user": USER,
             "createdAt": "2024-02-01T00:00:00.000Z"},
            {"id": "review-2", "review": "Too many mosquitoes", "rating": 3, "tour": "tour-forest-hiker", "user": MOVED_ON,
             "createdAt": "2024-02-02T00:00:00.000Z"},
            {"id": "review-3", "review": "Sea sick but happy", "rating": 4, "tour": "tour-sea-explorer", "user": USER,
             "createdAt": "2024-02-03T00:00:00.000Z"},
        ])),
    );

    data
}

pub async fn seeded_memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    if let Err(e) = apply_seed(&store, &ResourceRegistry::standard(), fixture_data()).await {
        panic!("fixture seeding failed: {}", e);
    }
    store
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(seeded_memory_store().await)
}

/// A complete, valid tour payload
pub fn sample_tour(name: &str) -> Document {
    let value = json!({
        "name": name,
        "duration": 6,
        "maxGroupSize": 12,
        "difficulty": "medium",
        "price": 799,
        "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
        "imageCover": "tour-2-cover.jpg",
        "startLocation": {"coordinates": [-80.18, 25.77], "address": "301 Biscayne Blvd, Miami, FL 33132, USA", "description": "Miami, USA"},
        "locations": [{"coordinates": [-80.12, 25.79], "address": "Lummus Park Beach", "description": "Miami Beach", "day": 1}],
    });
    value.as_object().cloned().unwrap_or_default()
}

/// Bearer token for `user_id`, issued now
pub fn token_for(user_id: &str, security: &SecurityConfig) -> String {
    token_issued_at(user_id, Utc::now(), security)
}

pub fn token_issued_at(user_id: &str, at: DateTime<Utc>, security: &SecurityConfig) -> String {
    match generate_jwt(&Claims::issued_at(user_id, at, security.jwt_expiry_hours), security) {
        Ok(token) => token,
        Err(e) => panic!("cannot sign test token: {}", e),
    }
}

/// Delegates to a memory store after sleeping; used to trip store deadlines
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ResourceStore for SlowStore {
    async fn find(&self, collection: &str, spec: &QuerySpec) -> StoreResult<Vec<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(collection, spec).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_id(collection, id).await
    }

    async fn create(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(collection, doc).await
    }

    async fn update_by_id(&self, collection: &str, id: &str, patch: Document) -> StoreResult<Option<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_by_id(collection, id, patch).await
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> StoreResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_by_id(collection, id).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}
