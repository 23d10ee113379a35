use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tracing::error;

use super::domain::ApplicationId;
use super::service::{EligibilityService, EligibilityServiceError};
use super::views::CheckView;

/// Router builder exposing HTTP endpoints for triggering and auditing evaluations.
pub fn eligibility_router(service: Arc<EligibilityService>) -> Router {
    Router::new()
        .route(
            "/api/v1/applications/:application_id/eligibility",
            post(evaluate_handler),
        )
        .route(
            "/api/v1/applications/:application_id/eligibility/checks",
            get(history_handler),
        )
        .with_state(service)
}

pub(crate) async fn evaluate_handler(
    State(service): State<Arc<EligibilityService>>,
    Path(application_id): Path<u64>,
) -> Response {
    let id = ApplicationId(application_id);
    // The mycroft wait blocks, so evaluations stay off the async workers.
    let joined = tokio::task::spawn_blocking(move || service.process(id)).await;

    match joined {
        Ok(Ok(run)) => (StatusCode::ACCEPTED, axum::Json(run.view())).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(join_error) => {
            error!(application_id = %id, %join_error, "eligibility evaluation task failed");
            let payload = json!({ "error": "evaluation task failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn history_handler(
    State(service): State<Arc<EligibilityService>>,
    Path(application_id): Path<u64>,
) -> Response {
    let id = ApplicationId(application_id);
    match service.history(id) {
        Ok(outcomes) => {
            let checks: Vec<CheckView> = outcomes.iter().map(CheckView::from).collect();
            let payload = json!({
                "application_id": id,
                "checks": checks,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: EligibilityServiceError) -> Response {
    let status = match &error {
        EligibilityServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        EligibilityServiceError::Deleted(_) | EligibilityServiceError::NotEvaluable { .. } => {
            StatusCode::CONFLICT
        }
        EligibilityServiceError::Repository(_)
        | EligibilityServiceError::Engine(_)
        | EligibilityServiceError::Audit(_)
        | EligibilityServiceError::Gateway(_)
        | EligibilityServiceError::Dispatch(_) => {
            error!(%error, "eligibility evaluation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
