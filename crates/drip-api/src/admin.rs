//! Operator endpoints. Both require [`AdminAuth`].

use axum::{Json, extract::State};
use chrono::Utc;
use drip_core::{dispatch::Dispatcher, store::EnrollmentStore};
use drip_engine::{BatchSummary, QueueReport};

use crate::{AppState, auth::AdminAuth, error::ApiError};

/// `POST /api/drip/process`: run one batch pass now.
pub async fn process<S, D>(
  _auth: AdminAuth,
  State(state): State<AppState<S, D>>,
) -> Result<Json<BatchSummary>, ApiError>
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  tracing::info!("batch pass triggered over HTTP");
  let summary = state.sequencer.process_due(Utc::now()).await?;
  Ok(Json(summary))
}

/// `GET /api/drip/queue`
pub async fn queue<S, D>(
  _auth: AdminAuth,
  State(state): State<AppState<S, D>>,
) -> Result<Json<QueueReport>, ApiError>
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  Ok(Json(state.sequencer.queue().await?))
}
