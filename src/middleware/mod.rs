pub mod auth;
pub mod authorize;
pub mod context;
pub mod policy;
pub mod response;
pub mod scope;

pub use auth::{authenticate, Gate, PRINCIPAL_COLLECTION};
pub use authorize::authorize_role;
pub use context::{ChainState, RequestContext};
pub use policy::{AccessPolicy, Check};
pub use response::{ApiResponse, ApiResult};
pub use scope::scope_nested_resource;
