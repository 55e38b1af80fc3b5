use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::warn;
use ziwu_agent::{DiagnosisRuntime, Envelope};

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct DiagnoseState {
    runtime: Arc<DiagnosisRuntime>,
}

pub fn router(runtime: Arc<DiagnosisRuntime>) -> Router {
    Router::new()
        .route("/api/diagnose", post(diagnose))
        .route("/diagnose", post(diagnose))
        .with_state(DiagnoseState { runtime })
}

/// The body is taken as bytes so that malformed JSON still gets the envelope.
async fn diagnose(State(state): State<DiagnoseState>, body: Bytes) -> Response {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "http.diagnose.invalid_json",
                body_bytes = body.len(),
                error = %error,
                "diagnose request body is not JSON"
            );
            let envelope = Envelope::failure(format!("Request body must be JSON: {error}"));
            return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
        }
    };

    let reply = state.runtime.handle(&payload).await;
    let status =
        StatusCode::from_u16(reply.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, [(CORRELATION_HEADER, reply.correlation_id)], Json(reply.envelope)).into_response()
}
