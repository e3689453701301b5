//! Handlers for enrollment endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/enroll` | form or query: `studentId`, `subjectId` (alias `sectionId`) |
//! | `POST` | `/enroll/cancel` | same parameters |
//! | `GET`  | `/students/{id}/enrollments` | live enrollments with schedule |
//! | `GET`  | `/enrollments` | every live enrollment; admin only |
//!
//! A student principal may omit `studentId`; it defaults to themselves.

use axum::{
  Json,
  extract::{Form, Path, Query, State, rejection::FormRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use registrar_core::{
  access::{Capability, Principal},
  enrollment::{CancelOutcome, EnrollOutcome, Enrollment, EnrollmentDetail},
  store::RegistrarStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, Caller, error::ApiError};

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Raw request parameters. Ids stay strings so a malformed id produces a
/// JSON 400 rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollParams {
  pub student_id: Option<String>,
  #[serde(alias = "sectionId")]
  pub subject_id: Option<String>,
}

impl EnrollParams {
  /// Fill unset fields from `fallback`.
  fn or(self, fallback: Self) -> Self {
    Self {
      student_id: non_empty(self.student_id).or(fallback.student_id),
      subject_id: non_empty(self.subject_id).or(fallback.subject_id),
    }
  }

  fn resolve(self, principal: &Principal) -> Result<(Uuid, Uuid), ApiError> {
    let student_id = match non_empty(self.student_id) {
      Some(s) => parse_id("studentId", &s)?,
      None => principal
        .student_id()
        .ok_or_else(|| ApiError::BadRequest("studentId is required".into()))?,
    };
    let subject_id = non_empty(self.subject_id)
      .ok_or_else(|| ApiError::BadRequest("subjectId is required".into()))?;
    Ok((student_id, parse_id("subjectId", &subject_id)?))
  }
}

fn non_empty(s: Option<String>) -> Option<String> { s.filter(|s| !s.trim().is_empty()) }

fn parse_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(raw.trim())
    .map_err(|_| ApiError::BadRequest(format!("{field} is not a valid id: {raw:?}")))
}

/// Body parameters take precedence over the query string.
fn merge(
  query: EnrollParams,
  form: Result<Form<EnrollParams>, FormRejection>,
) -> EnrollParams {
  match form {
    Ok(Form(body)) => body.or(query),
    Err(_) => query,
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// `{"outcome": "...", "message": "...", ...variant fields}`
#[derive(Debug, Serialize)]
pub struct OutcomeBody<T> {
  #[serde(flatten)]
  pub outcome: T,
  pub message: &'static str,
}

pub fn enroll_status(outcome: &EnrollOutcome) -> StatusCode {
  match outcome {
    EnrollOutcome::Enrolled { .. } => StatusCode::CREATED,
    EnrollOutcome::SubjectNotFound => StatusCode::NOT_FOUND,
    EnrollOutcome::AlreadyEnrolled
    | EnrollOutcome::CapacityExceeded
    | EnrollOutcome::TimeConflict { .. } => StatusCode::CONFLICT,
  }
}

fn enroll_response(outcome: EnrollOutcome) -> Response {
  let status = enroll_status(&outcome);
  let message = outcome.message();
  (status, Json(OutcomeBody { outcome, message })).into_response()
}

fn cancel_response(outcome: CancelOutcome) -> Response {
  let message = outcome.message();
  (StatusCode::OK, Json(OutcomeBody { outcome, message })).into_response()
}

// ─── Enroll ──────────────────────────────────────────────────────────────────

/// `POST /enroll`
pub async fn enroll<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Query(query): Query<EnrollParams>,
  form: Result<Form<EnrollParams>, FormRejection>,
) -> Result<Response, ApiError>
where
  S: RegistrarStore + 'static,
{
  let (student_id, subject_id) = merge(query, form).resolve(&principal)?;
  principal.authorize(Capability::EnrollFor(student_id))?;

  let outcome = state.admission.enroll(student_id, subject_id).await?;
  Ok(enroll_response(outcome))
}

// ─── Cancel ──────────────────────────────────────────────────────────────────

/// `POST /enroll/cancel`
pub async fn cancel<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Query(query): Query<EnrollParams>,
  form: Result<Form<EnrollParams>, FormRejection>,
) -> Result<Response, ApiError>
where
  S: RegistrarStore + 'static,
{
  let (student_id, subject_id) = merge(query, form).resolve(&principal)?;
  principal.authorize(Capability::EnrollFor(student_id))?;

  let outcome = state.admission.cancel(student_id, subject_id).await?;
  Ok(cancel_response(outcome))
}

// ─── Student timetable ───────────────────────────────────────────────────────

/// `GET /students/{id}/enrollments`
pub async fn for_student<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<EnrollmentDetail>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ViewStudent(id))?;

  if !state.store.student_exists(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("student {id} not found")));
  }

  let held = state
    .store
    .live_enrollments(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(held))
}

/// `GET /enrollments`
pub async fn list_all<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Enrollment>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let all = state
    .store
    .list_enrollments()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(all))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_per_outcome() {
    assert_eq!(enroll_status(&EnrollOutcome::AlreadyEnrolled), StatusCode::CONFLICT);
    assert_eq!(enroll_status(&EnrollOutcome::SubjectNotFound), StatusCode::NOT_FOUND);
    assert_eq!(enroll_status(&EnrollOutcome::CapacityExceeded), StatusCode::CONFLICT);
    assert_eq!(
      enroll_status(&EnrollOutcome::TimeConflict { conflicting_subject_id: Uuid::nil() }),
      StatusCode::CONFLICT
    );
  }

  #[test]
  fn student_defaults_to_self() {
    let me = Uuid::new_v4();
    let subject = Uuid::new_v4();
    let params = EnrollParams { student_id: None, subject_id: Some(subject.to_string()) };
    assert_eq!(params.resolve(&Principal::Student(me)).unwrap(), (me, subject));
  }

  #[test]
  fn admin_must_name_student() {
    let params = EnrollParams { student_id: None, subject_id: Some(Uuid::new_v4().to_string()) };
    assert!(matches!(params.resolve(&Principal::Admin), Err(ApiError::BadRequest(_))));
  }

  #[test]
  fn body_overrides_query() {
    let body = EnrollParams { student_id: Some("b".into()), subject_id: Some(" ".into()) };
    let query = EnrollParams { student_id: Some("q".into()), subject_id: Some("s".into()) };
    let merged = body.or(query);
    assert_eq!(merged.student_id.as_deref(), Some("b"));
    assert_eq!(merged.subject_id.as_deref(), Some("s"));
  }
}
