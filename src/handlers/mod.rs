// Request handlers
//
// factory  - CRUD operations derived from a resource descriptor
// resource - axum adapters running access policies before the factory
// system   - banner, health and fallback

pub mod factory;
pub mod resource;
pub mod system;

pub use factory::ResourceHandlers;
pub use resource::{AliasState, ResourceState};
