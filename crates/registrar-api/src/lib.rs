//! JSON REST API for the registrar.
//!
//! Exposes an axum [`Router`] backed by any
//! [`registrar_core::store::RegistrarStore`]. Authentication is the caller's
//! responsibility: the mounting server must attach a
//! [`registrar_core::access::Principal`] to each request's extensions before
//! it reaches these handlers. Requests without one are rejected with 401.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", registrar_api::api_router(ApiState::new(store, policy)))
//! ```

pub mod catalog;
pub mod enrollments;
pub mod error;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{delete, get, post, put},
};
use registrar_core::{
  access::Principal,
  admission::{AdmissionController, AdmissionPolicy},
  store::RegistrarStore,
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct ApiState<S> {
  pub store:     Arc<S>,
  pub admission: AdmissionController<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), admission: self.admission.clone() }
  }
}

impl<S: RegistrarStore> ApiState<S> {
  pub fn new(store: Arc<S>, policy: AdmissionPolicy) -> Self {
    let admission = AdmissionController::new(Arc::clone(&store), policy);
    Self { store, admission }
  }
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated principal for the current request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Principal>()
      .copied()
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}

/// `GET /me`: the principal the credentials resolved to.
pub async fn me(Caller(principal): Caller) -> Json<Principal> { Json(principal) }

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: RegistrarStore + 'static,
{
  Router::new()
    .route("/me", get(me))
    // Enrollment
    .route("/enroll", post(enrollments::enroll::<S>))
    .route("/enroll/cancel", post(enrollments::cancel::<S>))
    .route("/students/{id}/enrollments", get(enrollments::for_student::<S>))
    .route("/enrollments", get(enrollments::list_all::<S>))
    // Subjects and schedules
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>)
        .patch(subjects::update::<S>)
        .delete(subjects::remove::<S>),
    )
    .route("/subjects/{id}/schedule", post(subjects::add_meeting::<S>))
    .route("/schedule/{slot_id}", delete(subjects::remove_meeting::<S>))
    // Catalog administration
    .route(
      "/departments",
      get(catalog::list_departments::<S>).post(catalog::create_department::<S>),
    )
    .route(
      "/departments/{id}",
      put(catalog::update_department::<S>).delete(catalog::delete_department::<S>),
    )
    .route(
      "/professors",
      get(catalog::list_professors::<S>).post(catalog::create_professor::<S>),
    )
    .route(
      "/professors/{id}",
      put(catalog::update_professor::<S>).delete(catalog::delete_professor::<S>),
    )
    .route("/rooms", get(catalog::list_rooms::<S>).post(catalog::create_room::<S>))
    .route(
      "/rooms/{id}",
      put(catalog::update_room::<S>).delete(catalog::delete_room::<S>),
    )
    .route(
      "/students",
      get(catalog::list_students::<S>).post(catalog::create_student::<S>),
    )
    .route(
      "/students/{id}",
      get(catalog::get_student::<S>)
        .put(catalog::update_student::<S>)
        .delete(catalog::delete_student::<S>),
    )
    .with_state(state)
}
