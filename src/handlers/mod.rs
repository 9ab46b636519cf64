pub mod catalog;
pub mod tasks;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{name}/trigger", post(tasks::trigger_task))
        .route("/opensea/contracts/{address}", get(catalog::get_contract))
        .route("/opensea/collections/{slug}", get(catalog::get_collection))
        .route("/opensea/collections/{slug}/stats", get(catalog::get_collection_stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
