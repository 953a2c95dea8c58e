pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod resource;
pub mod routes;
pub mod seed;
pub mod store;
pub mod types;

/// Fixtures for this crate's tests and for the `tests/` suites (`testing` feature)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use routes::{app, AppState};
