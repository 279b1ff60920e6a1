//! Message templates for drip campaign stages.
//!
//! Maps a stage's template key and an [`Enrollment`] to a complete subject
//! and HTML body. Pure synchronous; no I/O. Identical input always yields
//! byte-identical output.
//!
//! # Quick start
//!
//! ```no_run
//! # fn demo(enrollment: &drip_core::enrollment::Enrollment) {
//! use drip_render::Renderer;
//!
//! let renderer = Renderer::new("https://example.com");
//! let message = renderer.render("gap-report", enrollment).unwrap();
//! println!("{}", message.subject);
//! # }
//! ```

pub mod error;
mod format;
mod templates;

pub use error::{Error, Result};
pub use format::{escape_html, format_currency};

use drip_core::enrollment::Enrollment;

use templates::Vars;

/// A rendered message, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
  pub subject: String,
  pub html:    String,
}

/// Renders stage templates with links rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct Renderer {
  base_url: String,
}

impl Renderer {
  pub fn new(base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_owned();
    Self { base_url }
  }

  /// Whether `key` names a known template.
  pub fn has_template(&self, key: &str) -> bool {
    templates::lookup(key).is_some()
  }

  /// All known template keys.
  pub fn template_keys(&self) -> impl Iterator<Item = &'static str> {
    templates::TEMPLATES.iter().map(|(k, _)| *k)
  }

  /// Deep link to the practice's scan report.
  pub fn report_url(&self, npi: &str) -> String {
    format!("{}/scan?npi={}", self.base_url, urlencoding::encode(npi))
  }

  /// Stage-independent opt-out link for `email`.
  pub fn unsubscribe_url(&self, email: &str) -> String {
    format!(
      "{}/api/drip/unsubscribe?email={}",
      self.base_url,
      urlencoding::encode(email)
    )
  }

  /// Render template `key` for `enrollment`.
  pub fn render(&self, key: &str, enrollment: &Enrollment) -> Result<RenderedMessage> {
    let template =
      templates::lookup(key).ok_or_else(|| Error::TemplateNotFound(key.to_owned()))?;

    let profile = &enrollment.profile;
    let vars = Vars {
      name:            &profile.display_name,
      specialty:       &profile.specialty,
      region:          profile.region(),
      gap:             format_currency(profile.estimated_gap),
      report_url:      self.report_url(&enrollment.identity.npi),
      unsubscribe_url: self.unsubscribe_url(&enrollment.identity.email),
    };

    let content = template(&vars);
    let html = templates::layout(&content, &vars);
    Ok(RenderedMessage { subject: content.subject, html })
  }
}
