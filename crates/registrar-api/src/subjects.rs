//! Handlers for `/subjects` and `/schedule` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects` | `?q=&department_id=&professor_id=&semester=&limit=&offset=` |
//! | `POST`   | `/subjects` | Body: [`NewSubject`] |
//! | `GET`    | `/subjects/{id}` | 404 if not found |
//! | `PATCH`  | `/subjects/{id}` | Body: [`SubjectPatch`] |
//! | `DELETE` | `/subjects/{id}` | 204 / 404 |
//! | `POST`   | `/subjects/{id}/schedule` | Body: [`NewMeeting`] |
//! | `DELETE` | `/schedule/{slot_id}` | 204 / 404 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  access::Capability,
  catalog::{NewSubject, Subject, SubjectListing, SubjectPatch},
  schedule::NewMeeting,
  store::{RegistrarStore, SubjectQuery},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, Caller, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// Free-text match on the subject name.
  pub q:             Option<String>,
  pub department_id: Option<Uuid>,
  pub professor_id:  Option<Uuid>,
  pub semester:      Option<String>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

impl From<ListParams> for SubjectQuery {
  fn from(p: ListParams) -> Self {
    SubjectQuery {
      text:          p.q.filter(|q| !q.is_empty()),
      department_id: p.department_id,
      professor_id:  p.professor_id,
      semester:      p.semester,
      limit:         p.limit,
      offset:        p.offset,
    }
  }
}

/// `GET /subjects`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  _caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SubjectListing>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  let query = SubjectQuery::from(params);
  let listings = state
    .store
    .list_subjects(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(listings))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  _caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Subject>, ApiError>
where
  S: RegistrarStore + 'static,
{
  let subject = state
    .store
    .get_subject(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let subject = state
    .store
    .add_subject(body)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(subject_id = %subject.subject_id, name = %subject.name, "subject created");
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /subjects/{id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<SubjectPatch>,
) -> Result<Json<Subject>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if patch.is_empty() {
    return Err(ApiError::BadRequest("patch sets no fields".into()));
  }
  let subject = state
    .store
    .update_subject(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /subjects/{id}`. Also drops the schedule and live enrollments.
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.delete_subject(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("subject {id} not found")));
  }
  tracing::info!(subject_id = %id, "subject deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Schedule ─────────────────────────────────────────────────────────────────

/// `POST /subjects/{id}/schedule`
pub async fn add_meeting<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewMeeting>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let slot = state
    .store
    .add_meeting(id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(slot)))
}

/// `DELETE /schedule/{slot_id}`
pub async fn remove_meeting<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.remove_meeting(slot_id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("meeting slot {slot_id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
