use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::Serialize;

use postloop_llm::TextGenerator;

use super::AppState;

pub const ROUTES: [&str; 6] = [
    "GET /test",
    "GET /health",
    "GET /post/ai",
    "GET /post/demo-tweet",
    "POST /post/tweet",
    "GET /posts/history",
];

#[derive(Serialize)]
pub struct Liveness {
    message: &'static str,
    timestamp: String,
    port: u16,
    routes: Vec<&'static str>,
}

pub async fn liveness(State(state): State<AppState>) -> Json<Liveness> {
    Json(Liveness {
        message: "Server is running!",
        timestamp: Utc::now().to_rfc3339(),
        port: state.port,
        routes: ROUTES.to_vec(),
    })
}

#[derive(Serialize)]
pub struct BackendHealth {
    backend: String,
    model: String,
    available: bool,
}

impl BackendHealth {
    async fn probe(model: &dyn TextGenerator) -> Self {
        Self {
            backend: model.name().to_string(),
            model: model.model().to_string(),
            available: model.is_available().await,
        }
    }
}

#[derive(Serialize)]
pub struct ModelHealth {
    status: &'static str,
    generator: BackendHealth,
    critic: BackendHealth,
}

pub async fn model_health(State(state): State<AppState>) -> (StatusCode, Json<ModelHealth>) {
    let generator = BackendHealth::probe(state.pipeline.generator_model()).await;
    let critic = BackendHealth::probe(state.pipeline.critic_model()).await;

    let (code, status) = if generator.available && critic.available {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        code,
        Json(ModelHealth {
            status,
            generator,
            critic,
        }),
    )
}
