//! HTTP Basic-auth extractor guarding the admin routes.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use drip_core::{dispatch::Dispatcher, store::EnrollmentStore};

use crate::{AppState, error::ApiError};

/// The single operator account allowed to call admin routes.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AuthConfig {
  /// Whether `username`/`password` name the operator. An empty or
  /// malformed hash accepts nobody.
  pub fn accepts(&self, username: &str, password: &str) -> bool {
    if username != self.username {
      return false;
    }
    match PasswordHash::new(&self.password_hash) {
      Ok(hash) => Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok(),
      Err(_) => false,
    }
  }
}

/// Present in a handler's arguments means the caller is the operator.
pub struct AdminAuth;

/// The `(username, password)` pair carried by a `Basic` `Authorization`
/// header. The scheme name is matched case-insensitively.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("basic") {
    return None;
  }
  let raw = B64.decode(token.trim()).ok()?;
  let pair = String::from_utf8(raw).ok()?;
  let (username, password) = pair.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Check a `Basic` `Authorization` header against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  match basic_credentials(headers) {
    Some((username, password)) if config.accepts(&username, &password) => Ok(()),
    _ => Err(ApiError::Unauthorized),
  }
}

impl<S, D> FromRequestParts<AppState<S, D>> for AdminAuth
where
  S: EnrollmentStore + 'static,
  D: Dispatcher + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, D>,
  ) -> Result<Self, Self::Rejection> {
    if let Err(e) = verify_auth(&parts.headers, &state.auth) {
      tracing::warn!(path = %parts.uri.path(), "rejected admin request");
      return Err(e);
    }
    Ok(AdminAuth)
  }
}
