//! Public opt-out endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/drip/unsubscribe?email=` | Link target in every message; HTML page |
//! | `POST` | `/api/drip/unsubscribe?email=` | JSON `{success, found, count}` |
//!
//! The page is the same whether or not the address was enrolled, so the
//! link cannot be used to probe who is on the list.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::{Html, IntoResponse, Response},
};
use drip_core::{ValidationError, dispatch::Dispatcher, store::EnrollmentStore};
use drip_engine::UnsubscribeOutcome;
use drip_render::escape_html;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UnsubscribeParams {
  pub email: Option<String>,
}

impl UnsubscribeParams {
  fn email(&self) -> Result<&str, ValidationError> {
    match self.email.as_deref().map(str::trim) {
      Some(e) if !e.is_empty() => Ok(e),
      _ => Err(ValidationError::new("email", "is required")),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
  pub success: bool,
  pub found:   bool,
  pub count:   usize,
}

impl From<UnsubscribeOutcome> for UnsubscribeResponse {
  fn from(outcome: UnsubscribeOutcome) -> Self {
    let count = match outcome {
      UnsubscribeOutcome::Unsubscribed { count } => count,
      UnsubscribeOutcome::NotFound => 0,
    };
    Self { success: true, found: count > 0, count }
  }
}

/// `POST /api/drip/unsubscribe?email=<address>`
pub async fn post<S, D>(
  State(state): State<AppState<S, D>>,
  Query(params): Query<UnsubscribeParams>,
) -> Result<Json<UnsubscribeResponse>, ApiError>
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  let email = params.email()?;
  let outcome = state.sequencer.unsubscribe(email).await?;
  Ok(Json(outcome.into()))
}

/// `GET /api/drip/unsubscribe?email=<address>`
pub async fn page<S, D>(
  State(state): State<AppState<S, D>>,
  Query(params): Query<UnsubscribeParams>,
) -> Response
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  let Ok(email) = params.email() else {
    return (
      StatusCode::BAD_REQUEST,
      Html(render_page(
        "Missing address",
        "This unsubscribe link is incomplete. Use the link from the bottom of any of our emails.",
      )),
    )
      .into_response();
  };

  match state.sequencer.unsubscribe(email).await {
    Ok(_) => Html(render_page(
      "You're unsubscribed",
      &format!(
        "{} will not receive any further emails from this sequence.",
        escape_html(email)
      ),
    ))
    .into_response(),
    Err(e) => {
      tracing::error!(error = %e, "unsubscribe failed");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(render_page(
          "Something went wrong",
          "We could not process your request. Please try the link again later.",
        )),
      )
        .into_response()
    }
  }
}

/// `message` must already be HTML-safe.
fn render_page(title: &str, message: &str) -> String {
  format!(
    "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>{title}</title>\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"></head>\
<body style=\"font-family:sans-serif;max-width:480px;margin:64px auto;color:#1f2937\">\
<h1 style=\"font-size:22px\">{title}</h1><p>{message}</p></body></html>"
  )
}
