use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Loaded collections
        .route("/collections", get(handlers::list_collections))
        .route(
            "/collections/:name/json-schemas/:operation",
            get(handlers::get_json_schema),
        )
        // Dry-run translation
        .route(
            "/collections/:name/translate/query",
            post(handlers::translate_query),
        )
        .route(
            "/collections/:name/translate/commands",
            post(handlers::translate_commands),
        )
}
