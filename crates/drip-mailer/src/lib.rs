//! Delivery providers implementing [`Dispatcher`].
//!
//! [`HttpMailer`] posts `{from, to, subject, html}` to a transactional email
//! API. [`Mailer`] selects between it and the unconfigured fallback, which
//! fails every send with [`DispatchError::NotConfigured`].

use std::time::Duration;

use drip_core::dispatch::{Delivery, DispatchError, Dispatcher, OutboundMessage};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Provider settings, deserialised from the `[mail]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
  /// Full URL of the provider's send endpoint.
  #[serde(default = "default_api_url")]
  pub api_url:      String,
  pub api_key:      String,
  /// Sender, e.g. `"Revenue Scan <scan@example.com>"`.
  pub from:         String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_url() -> String { "https://api.resend.com/emails".to_owned() }

fn default_timeout_secs() -> u64 { 30 }

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
  from:    &'a str,
  to:      [&'a str; 1],
  subject: &'a str,
  html:    &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
  #[serde(default)]
  id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  error:   Option<String>,
}

/// Turn a non-2xx provider answer into a readable message.
fn provider_error(status: StatusCode, body: &str) -> DispatchError {
  let detail = serde_json::from_str::<ErrorResponse>(body)
    .ok()
    .and_then(|e| e.message.or(e.error))
    .unwrap_or_else(|| body.trim().chars().take(200).collect());
  if detail.is_empty() {
    DispatchError::Provider(status.to_string())
  } else {
    DispatchError::Provider(format!("{status}: {detail}"))
  }
}

// ─── HTTP provider ───────────────────────────────────────────────────────────

/// Client for a JSON email API authenticated with a bearer key.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpMailer {
  client: Client,
  config: MailerConfig,
}

impl HttpMailer {
  pub fn new(config: MailerConfig) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }
}

impl Dispatcher for HttpMailer {
  async fn send(&self, message: &OutboundMessage) -> Result<Delivery, DispatchError> {
    let body = SendRequest {
      from:    &self.config.from,
      to:      [&message.to],
      subject: &message.subject,
      html:    &message.html,
    };

    let resp = self
      .client
      .post(&self.config.api_url)
      .bearer_auth(&self.config.api_key)
      .header("Idempotency-Key", &message.idempotency_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| DispatchError::Transport(e.to_string()))?;

    let status = resp.status();
    let text = resp
      .text()
      .await
      .map_err(|e| DispatchError::Transport(e.to_string()))?;

    if !status.is_success() {
      return Err(provider_error(status, &text));
    }

    let provider_id = serde_json::from_str::<SendResponse>(&text)
      .ok()
      .and_then(|r| r.id);
    tracing::debug!(to = %message.to, ?provider_id, "provider accepted message");
    Ok(Delivery { provider_id })
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The dispatcher a server runs with.
#[derive(Clone)]
pub enum Mailer {
  Http(HttpMailer),
  /// No provider configured; every send fails deterministically.
  Unconfigured,
}

impl Mailer {
  pub fn from_config(config: Option<MailerConfig>) -> reqwest::Result<Self> {
    match config {
      Some(c) => Ok(Self::Http(HttpMailer::new(c)?)),
      None => {
        tracing::warn!("no [mail] provider configured; sends will fail");
        Ok(Self::Unconfigured)
      }
    }
  }
}

impl Dispatcher for Mailer {
  async fn send(&self, message: &OutboundMessage) -> Result<Delivery, DispatchError> {
    match self {
      Self::Http(m) => m.send(message).await,
      Self::Unconfigured => Err(DispatchError::NotConfigured),
    }
  }
}
