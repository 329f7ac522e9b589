//! Axum handlers implementing the HTTP surface.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::auth::BearerAuth;
use crate::coordinator;
use crate::dto::{CoordinatesQuery, HealthResponse, SubmitRequest, SubmitResponse};
use crate::error::ApiError;
use crate::retrieval::{self, ByIdOutcome};
use crate::state::AppState;

pub async fn submit_webhook(
    Extension(state): Extension<Arc<AppState>>,
    _auth: BearerAuth,
    Json(body): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let outcome = coordinator::submit(&state, body.lat, body.lng).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            id: outcome.id,
            status: outcome.status,
        }),
    )
        .into_response())
}

pub async fn get_webhook_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    match retrieval::get_by_id(&state, id).await? {
        ByIdOutcome::Ready(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        ByIdOutcome::NotReady => Ok(StatusCode::ACCEPTED.into_response()),
        ByIdOutcome::NotFound => Err(ApiError::not_found(format!("no such request {id}"))),
    }
}

pub async fn get_landmarks(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CoordinatesQuery>,
) -> Result<Response, ApiError> {
    let (Some(lat), Some(lng)) = (params.lat, params.lng) else {
        return Err(ApiError::validation(
            "both lat and lng query parameters are required",
            Default::default(),
        ));
    };
    let response = retrieval::get_by_coordinates(&state, lat, lng).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "UP" })
}
