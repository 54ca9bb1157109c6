mod health;
mod posts;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::pipeline::Pipeline;

pub use health::ROUTES;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub port: u16,
}

pub fn create_router(pipeline: Arc<Pipeline>, port: u16) -> Router {
    let state = AppState { pipeline, port };

    Router::new()
        .route("/test", get(health::liveness))
        .route("/health", get(health::model_health))
        .route("/post/ai", get(posts::generate_and_post))
        .route("/post/demo-tweet", get(posts::post_demo))
        .route("/post/tweet", post(posts::post_custom))
        .route("/posts/history", get(posts::history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
