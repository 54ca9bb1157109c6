use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use postloop_logging::HistoryEntry;
use postloop_publish::{PostId, PublishError};

use super::AppState;
use crate::pipeline::{PipelineError, PipelineReport};

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl ToString, hint: Option<&'static str>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            hint,
        }),
    )
}

/// One generate-critique run, published when it qualifies
pub async fn generate_and_post(
    State(state): State<AppState>,
) -> Result<Json<PipelineReport>, ApiError> {
    match state.pipeline.run_once(1, true).await {
        Ok(report) => Ok(Json(report)),
        Err(e @ PipelineError::ModelUnavailable { .. }) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            e,
            Some("Start the model backend, e.g. `ollama serve`"),
        )),
    }
}

#[derive(Deserialize)]
pub struct CustomPost {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
pub struct Published {
    id: PostId,
    text: String,
}

/// Publish caller-supplied text as is
pub async fn post_custom(
    State(state): State<AppState>,
    Json(body): Json<CustomPost>,
) -> Result<(StatusCode, Json<Published>), ApiError> {
    let text = match body.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Post text is required",
                Some(r#"{"text": "Your post content here"}"#),
            ))
        }
    };

    publish_text(&state, text).await
}

/// Publish a timestamped greeting to check the credentials end to end
pub async fn post_demo(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Published>), ApiError> {
    let text = format!(
        "Hello from postloop! Posted at {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    publish_text(&state, text).await
}

async fn publish_text(
    state: &AppState,
    text: String,
) -> Result<(StatusCode, Json<Published>), ApiError> {
    match state.pipeline.publisher().publish(&text).await {
        Ok(id) => {
            info!(post_id = %id, "Post published");
            Ok((StatusCode::CREATED, Json(Published { id, text })))
        }
        Err(e @ PublishError::MissingCredentials(_)) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            e,
            Some("Set CONSUMER_KEY, CONSUMER_KEY_SECRET, ACCESS_TOKEN and ACCESS_TOKEN_SECRET"),
        )),
        Err(e) => {
            warn!(error = %e, "Post failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e, None))
        }
    }
}

pub async fn history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.pipeline.history().entries())
}
