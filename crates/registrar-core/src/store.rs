//! The `RegistrarStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `registrar-store-sqlite`). It plays three roles: the persistence store for
//! catalog records, the subject directory and student directory consulted by
//! admissions, and the atomic admission/withdrawal primitive itself.

use std::future::Future;

use uuid::Uuid;

use crate::{
  admission::AdmissionPolicy,
  catalog::{
    Department, NewDepartment, NewProfessor, NewRoom, NewStudent, NewSubject,
    Professor, Room, Student, StudentLogin, Subject, SubjectListing,
    SubjectPatch,
  },
  enrollment::{CancelOutcome, EnrollOutcome, Enrollment, EnrollmentDetail},
  schedule::{MeetingSlot, NewMeeting},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RegistrarStore::list_subjects`].
#[derive(Debug, Clone, Default)]
pub struct SubjectQuery {
  /// Case-insensitive substring match on the subject name.
  pub text:          Option<String>,
  pub department_id: Option<Uuid>,
  pub professor_id:  Option<Uuid>,
  pub semester:      Option<String>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

// ─── Error classification ───────────────────────────────────────────────────

/// How a backend failure should be reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// A referenced record does not exist.
  NotFound,
  /// A unique key is already taken.
  Conflict,
  /// The input failed domain validation.
  Invalid,
  /// The backend could not serve the request.
  Unavailable,
}

/// Error type of a [`RegistrarStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind { StoreErrorKind::Unavailable }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a registrar storage backend.
///
/// Reads are never cached by implementations: every call observes the
/// current committed state.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RegistrarStore: Send + Sync {
  type Error: StoreError;

  // ── Departments, professors, rooms ────────────────────────────────────

  fn add_department(
    &self,
    input: NewDepartment,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  fn list_departments(
    &self,
  ) -> impl Future<Output = Result<Vec<Department>, Self::Error>> + Send + '_;

  /// Replace a department's fields. Returns `None` if it does not exist.
  fn update_department(
    &self,
    id: Uuid,
    input: NewDepartment,
  ) -> impl Future<Output = Result<Option<Department>, Self::Error>> + Send + '_;

  /// Professors, students and subjects in the department lose their
  /// department reference.
  fn delete_department(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn add_professor(
    &self,
    input: NewProfessor,
  ) -> impl Future<Output = Result<Professor, Self::Error>> + Send + '_;

  fn list_professors(
    &self,
  ) -> impl Future<Output = Result<Vec<Professor>, Self::Error>> + Send + '_;

  fn update_professor(
    &self,
    id: Uuid,
    input: NewProfessor,
  ) -> impl Future<Output = Result<Option<Professor>, Self::Error>> + Send + '_;

  /// Subjects taught by the professor become unassigned.
  fn delete_professor(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn add_room(
    &self,
    input: NewRoom,
  ) -> impl Future<Output = Result<Room, Self::Error>> + Send + '_;

  fn list_rooms(
    &self,
  ) -> impl Future<Output = Result<Vec<Room>, Self::Error>> + Send + '_;

  fn update_room(
    &self,
    id: Uuid,
    input: NewRoom,
  ) -> impl Future<Output = Result<Option<Room>, Self::Error>> + Send + '_;

  /// Meeting slots held in the room keep their time but lose the room.
  fn delete_room(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Students ──────────────────────────────────────────────────────────

  /// Create a student. Fails if the student number is already taken or
  /// the department does not exist.
  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn get_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  fn list_students(
    &self,
  ) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  /// Replace a student's fields. A `None` password hash keeps the stored
  /// one. Returns `None` if the student does not exist.
  fn update_student(
    &self,
    id: Uuid,
    input: NewStudent,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  /// Delete a student together with their enrollments.
  fn delete_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Look up the credentials for a student number.
  fn student_login<'a>(
    &'a self,
    student_number: &'a str,
  ) -> impl Future<Output = Result<Option<StudentLogin>, Self::Error>> + Send + 'a;

  // ── Subjects and schedules ────────────────────────────────────────────

  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject with its schedule. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  fn list_subjects<'a>(
    &'a self,
    query: &'a SubjectQuery,
  ) -> impl Future<Output = Result<Vec<SubjectListing>, Self::Error>> + Send + 'a;

  /// Apply a partial update. Returns `None` if the subject does not exist.
  fn update_subject(
    &self,
    id: Uuid,
    patch: SubjectPatch,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Delete a subject together with its schedule and enrollments. Returns
  /// `false` if it did not exist.
  fn delete_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn add_meeting(
    &self,
    subject_id: Uuid,
    input: NewMeeting,
  ) -> impl Future<Output = Result<MeetingSlot, Self::Error>> + Send + '_;

  fn remove_meeting(
    &self,
    slot_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Directory queries ─────────────────────────────────────────────────

  fn count_live_enrollments(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  fn get_schedule(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MeetingSlot>, Self::Error>> + Send + '_;

  fn student_exists(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn live_enrollments(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EnrollmentDetail>, Self::Error>> + Send + '_;

  /// Every live enrollment, oldest first.
  fn list_enrollments(
    &self,
  ) -> impl Future<Output = Result<Vec<Enrollment>, Self::Error>> + Send + '_;

  // ── Admission ─────────────────────────────────────────────────────────

  /// Evaluate [`crate::admission::decide`] and, on acceptance, insert the
  /// enrollment. The read and the write form one atomic unit with respect
  /// to every other `admit` on the same store.
  fn admit(
    &self,
    student_id: Uuid,
    subject_id: Uuid,
    policy: AdmissionPolicy,
  ) -> impl Future<Output = Result<EnrollOutcome, Self::Error>> + Send + '_;

  /// Delete the enrollment for `(student_id, subject_id)` if present.
  fn withdraw(
    &self,
    student_id: Uuid,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<CancelOutcome, Self::Error>> + Send + '_;
}
