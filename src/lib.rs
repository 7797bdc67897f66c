use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain logic.
pub mod accounts;
pub mod acl;
pub mod entity;
pub mod password;
pub mod stats;

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Root).
pub mod routes;
use auth::{AdminUser, RootUser};
use error::ApiError;
use routes::{authenticated, public, root};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// The header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// ApiDoc
///
/// Aggregates the `#[utoipa::path]` handlers and `ToSchema` models into the
/// OpenAPI document served at `/api-docs/openapi.json`. The generic entity
/// controllers are described through their body schemas.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::root_login,
        handlers::users::get_me, handlers::users::update_me, handlers::users::change_password,
        handlers::users::list_users, handlers::users::create_user, handlers::users::update_user,
        handlers::users::delete_user, handlers::stats::get_stats
    ),
    components(
        schemas(
            models::User, models::BankDetail, models::PersonalDetail, models::RegisterRequest,
            models::LoginRequest, models::LoginResponse, models::UpdateProfileRequest,
            models::ChangePasswordRequest, models::CreateUserRequest, models::UpdateUserRequest,
            models::MessageResponse, models::Credential, models::Lead, models::Project,
            models::Milestone, models::Expense, models::Earning, models::AccessToggleRequest,
            models::AccessChange, models::StatusCount, models::DashboardStats, models::Pagination,
        )
    ),
    tags(
        (name = "erp-panel", description = "ERP Admin Panel API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, immutable container handed to every request. Handlers pull the
/// part they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory in tests and bare local runs.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// api_key_middleware
///
/// Rejects with 401 unless the `x-api-key` header equals the configured key.
async fn api_key_middleware(
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented != Some(config.api_key.as_str()) {
        tracing::debug!("request rejected: missing or wrong api key");
        return Err(ApiError::InvalidApiKey);
    }
    Ok(next.run(request).await)
}

/// admin_middleware
///
/// Guards the authenticated tier. The `AdminUser` extractor does the work: an
/// invalid session is rejected with 401, an account without a role flag with 403.
/// The resolved identity is cached on the request for the handler.
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// root_middleware
///
/// Guards the root tier through the `RootUser` extractor.
async fn root_middleware(_root: RootUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tiers, applies their guards and the observability
/// stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API tiers. Route layers only wrap routes registered before them, so the
    // API key guard covers all three tiers and the session guards stay scoped.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .merge(root::root_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            root_middleware,
        )))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    // 3. Unguarded routes: health check and documentation.
    let base_router = api
        .route("/health", get(|| async { "ok" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` set above so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
