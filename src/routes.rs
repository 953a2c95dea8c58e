use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::error::ApiError;
use crate::handlers::{resource, system, AliasState, ResourceHandlers, ResourceState};
use crate::middleware::PRINCIPAL_COLLECTION;
use crate::resource::{Action, ResourceDescriptor, ResourceRegistry};
use crate::store::ResourceStore;

pub const API_PREFIX: &str = "/api/v1";

/// Process-wide state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub registry: Arc<ResourceRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, registry: ResourceRegistry, config: AppConfig) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    fn handlers_for(&self, descriptor: &Arc<ResourceDescriptor>) -> Arc<ResourceHandlers> {
        Arc::new(ResourceHandlers::new(descriptor.clone(), self.store.clone(), self.config.clone()))
    }
}

/// The full HTTP surface: system routes plus one route tree per registered resource
pub fn app(state: AppState) -> Router {
    let mut api = Router::new();
    for descriptor in state.registry.iter() {
        api = api.nest(&format!("/{}", descriptor.name), resource_routes(&state, descriptor));
    }

    let config = state.config.clone();
    let router = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .with_state(state)
        .nest(API_PREFIX, api)
        .fallback(system::fallback)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer(&config.security));

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn resource_routes(state: &AppState, descriptor: &Arc<ResourceDescriptor>) -> Router {
    let handlers = state.handlers_for(descriptor);
    let allowed = |action| descriptor.policy(action).is_some();

    let mut collection: MethodRouter<ResourceState> = MethodRouter::new();
    if allowed(Action::List) {
        collection = collection.get(resource::list);
    }
    if allowed(Action::Create) {
        collection = collection.post(resource::create);
    }

    let mut member: MethodRouter<ResourceState> = MethodRouter::new();
    if allowed(Action::Get) {
        member = member.get(resource::get_one);
    }
    if allowed(Action::Update) {
        member = member.patch(resource::update);
    }
    if allowed(Action::Delete) {
        member = member.delete(resource::delete);
    }

    let mut router = Router::new().route("/", collection).route("/:id", member);
    if descriptor.collection == PRINCIPAL_COLLECTION {
        router = router.route("/me", get(resource::get_me));
    }
    let mut router = router.with_state(ResourceState { handlers: handlers.clone() });

    for alias in &descriptor.aliases {
        let alias_router = Router::new()
            .route(&format!("/{}", alias.path), get(resource::alias_list))
            .with_state(AliasState {
                handlers: handlers.clone(),
                alias: Arc::new(alias.clone()),
            });
        router = router.merge(alias_router);
    }

    // Parent id shares the `:id` segment with the member routes above
    for child in state.registry.children_of(descriptor.name) {
        let mut nested: MethodRouter<ResourceState> = MethodRouter::new();
        if child.policy(Action::List).is_some() {
            nested = nested.get(resource::nested_list);
        }
        if child.policy(Action::Create).is_some() {
            nested = nested.post(resource::nested_create);
        }
        let nested_router = Router::new()
            .route(&format!("/:id/{}", child.name), nested)
            .with_state(ResourceState { handlers: state.handlers_for(child) });
        router = router.merge(nested_router);
        tracing::debug!("Mounted {} under {}/:id", child.name, descriptor.name);
    }

    router
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(cors::Any)
        .allow_headers(cors::Any)
}

/// A panicking handler answers with the internal-error envelope
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Request handler panicked: {}", detail);
    ApiError::internal(detail).into_response()
}
