//! Catalog administration: departments, professors, rooms and students.
//!
//! Every endpoint here requires [`Capability::ManageCatalog`], except
//! `GET /students/{id}`, which a student may call for their own record.
//! `PUT` replaces all editable fields of a record.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use registrar_core::{
  access::Capability,
  catalog::{
    Department, NewDepartment, NewProfessor, NewRoom, NewStudent, Professor,
    Room, Student,
  },
  store::RegistrarStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, Caller, error::ApiError};

fn missing(entity: &str, id: Uuid) -> ApiError {
  ApiError::NotFound(format!("{entity} {id} not found"))
}

// ─── Departments ─────────────────────────────────────────────────────────────

/// `GET /departments`
pub async fn list_departments<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Department>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let departments = state
    .store
    .list_departments()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(departments))
}

/// `POST /departments`, body: `{"name":"Physics"}`
pub async fn create_department<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<NewDepartment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let department = state
    .store
    .add_department(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(department)))
}

/// `PUT /departments/{id}`
pub async fn update_department<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewDepartment>,
) -> Result<Json<Department>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let department = state
    .store
    .update_department(id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| missing("department", id))?;
  Ok(Json(department))
}

/// `DELETE /departments/{id}`. Members keep existing without a department.
pub async fn delete_department<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.delete_department(id).await.map_err(ApiError::store)? {
    return Err(missing("department", id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Professors ──────────────────────────────────────────────────────────────

/// `GET /professors`
pub async fn list_professors<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Professor>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let professors = state
    .store
    .list_professors()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(professors))
}

/// `POST /professors`
pub async fn create_professor<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<NewProfessor>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let professor = state
    .store
    .add_professor(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(professor)))
}

/// `PUT /professors/{id}`
pub async fn update_professor<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewProfessor>,
) -> Result<Json<Professor>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let professor = state
    .store
    .update_professor(id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| missing("professor", id))?;
  Ok(Json(professor))
}

/// `DELETE /professors/{id}`. Their subjects become unassigned.
pub async fn delete_professor<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.delete_professor(id).await.map_err(ApiError::store)? {
    return Err(missing("professor", id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Rooms ───────────────────────────────────────────────────────────────────

/// `GET /rooms`
pub async fn list_rooms<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Room>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let rooms = state.store.list_rooms().await.map_err(ApiError::store)?;
  Ok(Json(rooms))
}

/// `POST /rooms`
pub async fn create_room<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<NewRoom>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let room = state.store.add_room(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(room)))
}

/// `PUT /rooms/{id}`
pub async fn update_room<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewRoom>,
) -> Result<Json<Room>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let room = state
    .store
    .update_room(id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| missing("room", id))?;
  Ok(Json(room))
}

/// `DELETE /rooms/{id}`
pub async fn delete_room<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.delete_room(id).await.map_err(ApiError::store)? {
    return Err(missing("room", id));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Students ────────────────────────────────────────────────────────────────

/// `GET /students`
pub async fn list_students<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
) -> Result<Json<Vec<Student>>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let students = state
    .store
    .list_students()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(students))
}

#[derive(Debug, Deserialize)]
pub struct StudentBody {
  pub student_number: String,
  pub name:           String,
  pub department_id:  Option<Uuid>,
  pub grade:          Option<String>,
  /// argon2 PHC string, as printed by `registrar-server --hash-password`.
  /// Students without one cannot sign in. Omitted on `PUT` to keep the
  /// current one.
  pub password_hash:  Option<String>,
}

impl StudentBody {
  fn into_input(self) -> Result<NewStudent, ApiError> {
    if self.student_number.trim().is_empty() {
      return Err(ApiError::BadRequest("student_number must not be empty".into()));
    }
    Ok(NewStudent {
      student_number: self.student_number,
      name:           self.name,
      department_id:  self.department_id,
      grade:          self.grade,
      password_hash:  self.password_hash,
    })
  }
}

/// `POST /students`
pub async fn create_student<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Json(body): Json<StudentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let student = state
    .store
    .add_student(body.into_input()?)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(student_id = %student.student_id, "student created");
  Ok((StatusCode::CREATED, Json(student)))
}

/// `GET /students/{id}`
pub async fn get_student<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Student>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ViewStudent(id))?;
  let student = state
    .store
    .get_student(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| missing("student", id))?;
  Ok(Json(student))
}

/// `PUT /students/{id}`
pub async fn update_student<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<StudentBody>,
) -> Result<Json<Student>, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  let student = state
    .store
    .update_student(id, body.into_input()?)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| missing("student", id))?;
  Ok(Json(student))
}

/// `DELETE /students/{id}`. Drops the student's enrollments too.
pub async fn delete_student<S>(
  State(state): State<ApiState<S>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: RegistrarStore + 'static,
{
  principal.authorize(Capability::ManageCatalog)?;
  if !state.store.delete_student(id).await.map_err(ApiError::store)? {
    return Err(missing("student", id));
  }
  tracing::info!(student_id = %id, "student deleted");
  Ok(StatusCode::NO_CONTENT)
}
