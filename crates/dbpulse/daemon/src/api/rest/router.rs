//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and summary
        .route("/health", get(handlers::health_check))
        .route("/summary", get(handlers::fleet_summary))
        // Collectors
        .route("/collectors", get(handlers::list_collectors))
        .route("/collectors/weights", get(handlers::collector_weights))
        .route("/collectors/:kind", put(handlers::update_collector))
        .route("/collectors/:kind/run", post(handlers::run_collector))
        .route("/collectors/:kind/executions", get(handlers::list_executions))
        // Rules
        .route("/collectors/:kind/rules", get(handlers::get_rules))
        .route("/collectors/:kind/rules", put(handlers::replace_rules))
        .route("/collectors/:kind/rules/reset", post(handlers::reset_rules))
        // Exceptions
        .route("/collectors/:kind/exceptions", get(handlers::list_exceptions))
        .route("/collectors/:kind/exceptions", post(handlers::create_exception))
        .route(
            "/collectors/:kind/exception-kinds",
            get(handlers::list_exception_kinds),
        )
        .route("/exceptions/:id", delete(handlers::delete_exception))
        // Scores
        .route("/consolidation/run", post(handlers::run_consolidation))
        .route("/scores", get(handlers::list_scores))
        .route("/scores/:server", get(handlers::get_score))
        .route("/scores/:server/categories", get(handlers::get_category_scores))
        .route("/transitions", get(handlers::list_transitions));

    // Build router with middleware
    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
