//! HTTP front end for the registrar.
//!
//! Resolves HTTP Basic credentials to a [`Principal`] and mounts the JSON
//! API from `registrar-api` under `/api`, backed by any [`RegistrarStore`].
//!
//! [`Principal`]: registrar_core::access::Principal

pub mod auth;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, middleware::from_fn_with_state};
use registrar_api::{ApiState, api_router};
use registrar_core::{admission::AdmissionPolicy, store::RegistrarStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Environment variables `REGISTRAR_<FIELD>` override the config file.
pub const ENV_PREFIX: &str = "REGISTRAR";

/// Runtime server configuration, deserialised from `config.toml` and
/// `REGISTRAR_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  pub store_path:           PathBuf,
  pub admin_username:       String,
  /// argon2 PHC string, see `registrar-server --hash-password`.
  pub admin_password_hash:  String,
  /// Reject enrollments that overlap a subject the student already holds.
  #[serde(default = "default_check_time_conflicts")]
  pub check_time_conflicts: bool,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_check_time_conflicts() -> bool { true }

impl ServerConfig {
  /// Read `file` if it exists, then apply environment overrides.
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    Self::from_source(config::File::from(file).required(false))
  }

  fn from_source<T>(file: T) -> Result<Self, config::ConfigError>
  where
    T: config::Source + Send + Sync + 'static,
  {
    config::Config::builder()
      .add_source(file)
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()?
      .try_deserialize()
  }

  /// `store_path` with a leading `~/` resolved against `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    expand_home(&self.store_path, std::env::var("HOME").ok().as_deref())
  }

  pub fn policy(&self) -> AdmissionPolicy {
    AdmissionPolicy { check_time_conflicts: self.check_time_conflicts }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      admin_username:      self.admin_username.clone(),
      admin_password_hash: self.admin_password_hash.clone(),
    }
  }
}

fn expand_home(path: &Path, home: Option<&str>) -> PathBuf {
  match (path.strip_prefix("~"), home) {
    (Ok(rest), Some(home)) => Path::new(home).join(rest),
    _ => path.to_path_buf(),
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state for the server's own middleware.
pub struct AppState<S> {
  pub api:  ApiState<S>,
  pub auth: Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { api: self.api.clone(), auth: Arc::clone(&self.auth) }
  }
}

impl<S: RegistrarStore> AppState<S> {
  pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
    Self {
      api:  ApiState::new(store, config.policy()),
      auth: Arc::new(config.auth()),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`]: the API under `/api`, every route
/// behind Basic auth, and request tracing around everything.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RegistrarStore + 'static,
{
  let api = api_router(state.api.clone())
    .route_layer(from_fn_with_state(state, auth::authenticate::<S>));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use registrar_core::catalog::{NewStudent, NewSubject};
  use registrar_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  fn hash(password: &str) -> String { auth::hash_password(password).unwrap() }

  fn server_config(check_time_conflicts: bool) -> ServerConfig {
    ServerConfig {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           PathBuf::from(":memory:"),
      admin_username:       "registrar".to_string(),
      admin_password_hash:  hash("admin-secret"),
      check_time_conflicts,
    }
  }

  async fn make_state() -> (AppState<SqliteStore>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    (AppState::new(Arc::clone(&store), &server_config(true)), store)
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot(
    state:  AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<String>,
    form:   Option<String>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let body = match form {
      Some(f) => {
        builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        Body::from(f)
      }
      None => Body::empty(),
    };
    let res = router(state).oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  // ── Configuration ───────────────────────────────────────────────────────

  #[test]
  fn config_defaults() {
    let cfg = ServerConfig::from_source(config::File::from_str(
      r#"
        store_path          = "~/registrar.db"
        admin_username      = "registrar"
        admin_password_hash = "$argon2id$stub"
      "#,
      config::FileFormat::Toml,
    ))
    .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert!(cfg.check_time_conflicts);
    assert_eq!(cfg.policy(), AdmissionPolicy::default());
  }

  #[test]
  fn missing_file_needs_required_fields() {
    let err = ServerConfig::load(Path::new("/nonexistent/registrar.toml")).unwrap_err();
    assert!(err.to_string().contains("store_path"), "{err}");
  }

  #[test]
  fn home_is_expanded_only_at_start() {
    let home = Some("/home/reg");
    assert_eq!(
      expand_home(Path::new("~/data/registrar.db"), home),
      PathBuf::from("/home/reg/data/registrar.db")
    );
    assert_eq!(
      expand_home(Path::new("/var/lib/registrar.db"), home),
      PathBuf::from("/var/lib/registrar.db")
    );
    assert_eq!(expand_home(Path::new("~/x.db"), None), PathBuf::from("~/x.db"));
  }

  #[test]
  fn time_conflicts_can_be_disabled() {
    assert_eq!(server_config(false).policy(), AdmissionPolicy::capacity_only());
  }

  // ── Authentication ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_credentials_resolve_to_admin() {
    let (state, _) = make_state().await;
    let (status, body) = oneshot(
      state,
      "GET",
      "/api/me",
      Some(auth_header("registrar", "admin-secret")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
  }

  #[tokio::test]
  async fn wrong_password_is_unauthorized() {
    let (state, _) = make_state().await;
    let req = Request::builder()
      .uri("/api/me")
      .header(header::AUTHORIZATION, auth_header("registrar", "wrong"))
      .body(Body::empty())
      .unwrap();
    let res = router(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      res.headers().get(header::WWW_AUTHENTICATE).unwrap(),
      "Basic realm=\"registrar\""
    );
  }

  #[tokio::test]
  async fn missing_header_is_unauthorized() {
    let (state, _) = make_state().await;
    let (status, _) = oneshot(state, "GET", "/api/subjects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn unknown_route_is_not_found() {
    let (state, _) = make_state().await;
    let (status, _) = oneshot(
      state,
      "GET",
      "/api/nowhere",
      Some(auth_header("registrar", "admin-secret")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn student_signs_in_and_enrolls_self() {
    let (state, store) = make_state().await;
    let student = store
      .add_student(NewStudent {
        student_number: "20240001".into(),
        name:           "Kim".into(),
        department_id:  None,
        grade:          None,
        password_hash:  Some(hash("student-secret")),
      })
      .await
      .unwrap();
    let subject = store
      .add_subject(NewSubject {
        name:          "Operating Systems".into(),
        credits:       3,
        capacity:      40,
        semester:      "2024-1".into(),
        professor_id:  None,
        department_id: None,
      })
      .await
      .unwrap();

    let creds = auth_header("20240001", "student-secret");

    let (status, body) = oneshot(state.clone(), "GET", "/api/me", Some(creds.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_id"], student.student_id.to_string());

    let (status, body) = oneshot(
      state.clone(),
      "POST",
      "/api/enroll",
      Some(creds.clone()),
      Some(format!("subjectId={}", subject.subject_id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["outcome"], "enrolled");

    let (status, _) = oneshot(
      state,
      "POST",
      "/api/enroll",
      Some(creds),
      Some(format!("studentId={}&subjectId={}", Uuid::new_v4(), subject.subject_id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn student_without_password_cannot_sign_in() {
    let (state, store) = make_state().await;
    store
      .add_student(NewStudent {
        student_number: "20240002".into(),
        name:           "Lee".into(),
        department_id:  None,
        grade:          None,
        password_hash:  None,
      })
      .await
      .unwrap();

    let (status, _) =
      oneshot(state, "GET", "/api/me", Some(auth_header("20240002", "")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }
}
