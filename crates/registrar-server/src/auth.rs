//! HTTP Basic authentication resolving a [`Principal`].
//!
//! The configured admin username authenticates against the hash in the
//! server config. Any other username is treated as a student number and
//! checked against that student's stored hash.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use registrar_api::ApiError;
use registrar_core::{access::Principal, store::RegistrarStore};

use crate::AppState;

/// Admin credentials accepted by this server instance.
#[derive(Debug, Clone)]
pub struct AuthConfig {
  pub admin_username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_password_hash: String,
}

/// Split an `Authorization: Basic …` header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_string(), password.to_string()))
}

/// Hash a password into the PHC string stored in `admin_password_hash` or
/// a student's `password_hash`.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

fn password_matches(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Resolve credentials to a principal. Unknown users, students without a
/// password, and wrong passwords are all `Unauthorized`.
pub async fn resolve_principal<S: RegistrarStore>(
  headers: &HeaderMap,
  config:  &AuthConfig,
  store:   &S,
) -> Result<Principal, ApiError> {
  let (username, password) = basic_credentials(headers)?;

  if username == config.admin_username {
    return if password_matches(&password, &config.admin_password_hash) {
      Ok(Principal::Admin)
    } else {
      Err(ApiError::Unauthorized)
    };
  }

  let login = store
    .student_login(&username)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  match login.password_hash {
    Some(phc) if password_matches(&password, &phc) => Ok(Principal::Student(login.student_id)),
    _ => Err(ApiError::Unauthorized),
  }
}

/// Middleware attaching the caller's [`Principal`] to the request.
pub async fn authenticate<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError>
where
  S: RegistrarStore + 'static,
{
  let principal = resolve_principal(req.headers(), &state.auth, &*state.api.store).await;
  let principal = principal.inspect_err(|_| {
    tracing::debug!(uri = %req.uri(), "rejected credentials");
  })?;

  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}
