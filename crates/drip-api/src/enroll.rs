//! `POST /api/drip/enroll`, the public sign-up endpoint.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use drip_core::{
  dispatch::Dispatcher, enrollment::EnrollmentRequest, store::EnrollmentStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
  pub success: bool,
  pub id:      Uuid,
  /// `false` when the contact was already enrolled and active.
  pub created: bool,
}

/// `POST /api/drip/enroll`, body: [`EnrollmentRequest`] JSON.
pub async fn handler<S, D>(
  State(state): State<AppState<S, D>>,
  body: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> Result<Json<EnrollResponse>, ApiError>
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let outcome = state.sequencer.enroll(request).await?;
  Ok(Json(EnrollResponse {
    success: true,
    id:      outcome.enrollment_id,
    created: outcome.created,
  }))
}
