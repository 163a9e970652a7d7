use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS for the web client and the agent runtime
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(extractors::USER_ID_HEADER),
        ])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/content", content_routes())
        .nest("/api/v1/exercises", exercise_routes())
        .nest("/api/v1/agent", agent_routes())
        .layer(cors)
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn content_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/start/{node_id}", post(handlers::content::start_node))
        .route(
            "/step/{node_id}/{step_number}",
            get(handlers::content::get_step),
        )
        .route("/all-steps/{node_id}", get(handlers::content::all_steps))
        .route(
            "/complete-exercise/{node_id}/{exercise_id}",
            post(handlers::content::complete_exercise),
        )
        .route("/regenerate/{node_id}", post(handlers::content::regenerate))
        .route(
            "/status/{path_id}",
            get(handlers::content::generation_status),
        )
        .route("/{node_id}", get(handlers::content::get_node))
}

fn exercise_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/{exercise_id}", get(handlers::exercises::get_exercise))
        .route("/{exercise_id}/submit", post(handlers::exercises::submit))
        .route(
            "/{exercise_id}/result/{submission_id}",
            get(handlers::exercises::get_result),
        )
        .route("/{exercise_id}/hint", post(handlers::exercises::request_hint))
}

fn agent_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/content/display", post(handlers::agent::display_content))
        .route("/exercises", post(handlers::agent::create_exercise))
        .route("/nodes", post(handlers::agent::create_node))
        .route("/paths", post(handlers::agent::create_path))
}
