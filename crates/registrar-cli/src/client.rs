//! Async HTTP client wrapping the registrar JSON API.

use anyhow::{Context, Result, anyhow};
use registrar_core::{
  access::Principal, catalog::SubjectListing, enrollment::EnrollmentDetail,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Connection settings for the registrar API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// The server's answer to an enroll or cancel request. Rejections such as
/// a full subject arrive here too; they are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutcomeReply {
  pub outcome: String,
  pub message: String,
}

/// Async HTTP client for the registrar JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  // ── Identity ──────────────────────────────────────────────────────────────

  /// `GET /api/me`
  pub async fn me(&self) -> Result<Principal> {
    let resp = self
      .auth(self.client.get(self.url("/me")))
      .send()
      .await
      .context("GET /me failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /me → {}", resp.status()));
    }
    resp.json().await.context("deserialising principal")
  }

  // ── Enrollment ────────────────────────────────────────────────────────────

  /// `POST /api/enroll`
  pub async fn enroll(&self, student_id: Option<Uuid>, subject_id: Uuid) -> Result<OutcomeReply> {
    self.post_outcome("/enroll", student_id, subject_id).await
  }

  /// `POST /api/enroll/cancel`
  pub async fn cancel(&self, student_id: Option<Uuid>, subject_id: Uuid) -> Result<OutcomeReply> {
    self.post_outcome("/enroll/cancel", student_id, subject_id).await
  }

  async fn post_outcome(
    &self,
    path:       &str,
    student_id: Option<Uuid>,
    subject_id: Uuid,
  ) -> Result<OutcomeReply> {
    let mut form = vec![("subjectId", subject_id.to_string())];
    if let Some(id) = student_id {
      form.push(("studentId", id.to_string()));
    }

    let resp = self
      .auth(self.client.post(self.url(path)))
      .form(&form)
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;

    let status = resp.status();
    let body: Value = resp
      .json()
      .await
      .with_context(|| format!("POST {path} → {status}: unreadable body"))?;
    interpret(path, status, body)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `GET /api/subjects[?semester=<s>&q=<text>]`
  pub async fn list_subjects(
    &self,
    semester: Option<&str>,
    text:     Option<&str>,
  ) -> Result<Vec<SubjectListing>> {
    let mut query = Vec::new();
    if let Some(s) = semester {
      query.push(("semester", s));
    }
    if let Some(t) = text {
      query.push(("q", t));
    }

    let resp = self
      .auth(self.client.get(self.url("/subjects")))
      .query(&query)
      .send()
      .await
      .context("GET /subjects failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /subjects → {}", resp.status()));
    }
    resp.json().await.context("deserialising subjects")
  }

  /// `GET /api/students/{id}/enrollments`
  pub async fn enrollments(&self, student_id: Uuid) -> Result<Vec<EnrollmentDetail>> {
    let path = format!("/students/{student_id}/enrollments");
    let resp = self
      .auth(self.client.get(self.url(&path)))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET {path} → {}", resp.status()));
    }
    resp.json().await.context("deserialising enrollments")
  }
}

/// Outcome bodies are answers whatever their status; anything else is an
/// error carrying the server's `error` message.
fn interpret(path: &str, status: StatusCode, body: Value) -> Result<OutcomeReply> {
  if body.get("outcome").is_some() {
    return serde_json::from_value(body).context("deserialising outcome");
  }
  let message = body
    .get("error")
    .and_then(Value::as_str)
    .unwrap_or("no error message");
  Err(anyhow!("POST {path} → {status}: {message}"))
}
