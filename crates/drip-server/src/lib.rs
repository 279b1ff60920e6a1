//! Configuration and background scheduling for the drip server binary.

pub mod ticker;

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use drip_api::auth::AuthConfig;
use drip_core::{
  SequenceError,
  sequence::{Sequence, Stage},
};
use drip_engine::DEFAULT_DISPATCH_TIMEOUT;
use drip_mailer::MailerConfig;
use drip_render::Renderer;
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `DRIP_*` environment variables (`DRIP_SCHEDULER__ENABLED=false`).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  /// Public origin used for report and unsubscribe links in messages.
  #[serde(default = "default_base_url")]
  pub base_url:            String,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  #[serde(default = "default_admin_username")]
  pub admin_username:      String,
  /// argon2 PHC string; empty disables the admin routes.
  #[serde(default)]
  pub admin_password_hash: String,
  #[serde(default)]
  pub campaign:            CampaignConfig,
  #[serde(default)]
  pub scheduler:           SchedulerConfig,
  /// Absent means every send fails with "not configured".
  #[serde(default)]
  pub mail:                Option<MailerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
  #[serde(default = "default_campaign_name")]
  pub name:   String,
  #[serde(default = "Sequence::default_stages")]
  pub stages: Vec<Stage>,
}

impl Default for CampaignConfig {
  fn default() -> Self {
    Self { name: default_campaign_name(), stages: Sequence::default_stages() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
  /// Run batch passes in-process. Turn off when an external cron calls
  /// `POST /api/drip/process` or `--process-once` instead.
  #[serde(default = "default_true")]
  pub enabled:               bool,
  #[serde(default = "default_interval_secs")]
  pub interval_secs:         u64,
  #[serde(default = "default_dispatch_timeout_secs")]
  pub dispatch_timeout_secs: u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      enabled:               true,
      interval_secs:         default_interval_secs(),
      dispatch_timeout_secs: default_dispatch_timeout_secs(),
    }
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }
fn default_base_url() -> String { "http://localhost:8080".to_owned() }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/drip/drip.db") }
fn default_admin_username() -> String { "admin".to_owned() }
fn default_campaign_name() -> String { Sequence::DEFAULT_NAME.to_owned() }
fn default_true() -> bool { true }
fn default_interval_secs() -> u64 { 4 * 60 * 60 }
fn default_dispatch_timeout_secs() -> u64 { DEFAULT_DISPATCH_TIMEOUT.as_secs() }

impl ServerConfig {
  /// Read `path` (if it exists) and then the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::build(Config::builder().add_source(File::from(path).required(false)))
  }

  fn build(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(
        Environment::with_prefix("DRIP")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  /// The validated campaign sequence. Stages whose template the renderer
  /// does not know are logged; contacts reaching them fail per-pass.
  pub fn sequence(&self, renderer: &Renderer) -> Result<Sequence, SequenceError> {
    let sequence = Sequence::new(&self.campaign.name, self.campaign.stages.clone())?;
    for stage in sequence.stages() {
      if !renderer.has_template(&stage.template) {
        tracing::warn!(
          template = %stage.template,
          known = ?renderer.template_keys().collect::<Vec<_>>(),
          "campaign stage uses an unknown template"
        );
      }
    }
    Ok(sequence)
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
