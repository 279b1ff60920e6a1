//! HTTP surface for the drip sequencer.
//!
//! Exposes an axum [`Router`] over a [`Sequencer`]: public enrollment and
//! opt-out, plus Basic-auth protected operator routes. TLS and the periodic
//! scheduler are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = drip_api::router(AppState::new(sequencer, auth));
//! axum::serve(listener, app).await?;
//! ```

pub mod admin;
pub mod auth;
pub mod enroll;
pub mod error;
pub mod unsubscribe;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use drip_core::{dispatch::Dispatcher, store::EnrollmentStore};
use drip_engine::Sequencer;

use auth::AuthConfig;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, D> {
  pub sequencer: Arc<Sequencer<S, D>>,
  pub auth:      Arc<AuthConfig>,
}

impl<S, D> AppState<S, D> {
  pub fn new(sequencer: Arc<Sequencer<S, D>>, auth: AuthConfig) -> Self {
    Self { sequencer, auth: Arc::new(auth) }
  }
}

// Manual impl: neither the store nor the dispatcher needs to be `Clone`.
impl<S, D> Clone for AppState<S, D> {
  fn clone(&self) -> Self {
    Self { sequencer: Arc::clone(&self.sequencer), auth: Arc::clone(&self.auth) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full router for `state`.
pub fn router<S, D>(state: AppState<S, D>) -> Router
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  Router::new()
    .route("/healthz", get(healthz))
    // Public
    .route("/api/drip/enroll", post(enroll::handler::<S, D>))
    .route(
      "/api/drip/unsubscribe",
      get(unsubscribe::page::<S, D>).post(unsubscribe::post::<S, D>),
    )
    // Admin
    .route("/api/drip/process", post(admin::process::<S, D>))
    .route("/api/drip/queue", get(admin::queue::<S, D>))
    .with_state(state)
}

async fn healthz() -> &'static str { "ok" }

// ─── Integration tests ────────────────────────────────────────────────────────
