use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/health", routes::health::router())
        .nest("/api/news", routes::news::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
