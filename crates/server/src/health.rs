use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use ziwu_agent::RuleSource;

#[derive(Clone)]
pub struct HealthState {
    rules: Arc<dyn RuleSource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub rules: HealthCheck,
    pub checked_at: String,
}

pub fn router(rules: Arc<dyn RuleSource>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { rules })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let rules = rules_check(state.rules.as_ref()).await;
    let ready = rules.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "ziwu-server runtime initialized".to_string(),
        },
        rules,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn rules_check(rules: &dyn RuleSource) -> HealthCheck {
    match rules.get().await {
        Ok(text) => HealthCheck {
            status: "ready",
            detail: format!("rule document loaded ({} chars)", text.chars().count()),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
