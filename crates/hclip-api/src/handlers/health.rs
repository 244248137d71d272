//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use hclip_media::check_tool;
use hclip_media::fs_utils::is_dir_writable;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub model: CheckStatus,
    pub work_dir: CheckStatus,
    pub output_dir: CheckStatus,
    pub tools: BTreeMap<String, CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    /// Usable but not warmed up yet.
    fn pending() -> Self {
        Self {
            status: "pending".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Readiness check endpoint (readiness probe).
///
/// The model counts as ready once loaded, or pending while its artifact is
/// present but not loaded yet.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let model = state.pipeline.model();
    let model_check = if model.is_loaded() {
        CheckStatus::ok()
    } else if tokio::fs::try_exists(model.artifact()).await.unwrap_or(false) {
        CheckStatus::pending()
    } else {
        CheckStatus::error(format!("model not found at {}", model.artifact().display()))
    };

    let config = state.pipeline.config();
    let dir_check = |writable: bool, dir: &std::path::Path| {
        if writable {
            CheckStatus::ok()
        } else {
            CheckStatus::error(format!("{} is not writable", dir.display()))
        }
    };
    let work_dir_check = dir_check(is_dir_writable(&config.work_dir).await, &config.work_dir);
    let output_dir_check = dir_check(is_dir_writable(&config.output_dir).await, &config.output_dir);

    let tools: BTreeMap<String, CheckStatus> = state
        .required_tools
        .iter()
        .map(|tool| {
            let status = match check_tool(tool) {
                Ok(_) => CheckStatus::ok(),
                Err(e) => CheckStatus::error(e.to_string()),
            };
            (tool.clone(), status)
        })
        .collect();

    let all_ok = !model_check.is_error()
        && !work_dir_check.is_error()
        && !output_dir_check.is_error()
        && tools.values().all(|c| !c.is_error());

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            model: model_check,
            work_dir: work_dir_check,
            output_dir: output_dir_check,
            tools,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
