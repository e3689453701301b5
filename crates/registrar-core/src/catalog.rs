//! Catalog records: departments, professors, rooms, students and subjects.
//!
//! These are plain records owned by the persistence store. Apart from
//! referential integrity they carry no invariants; capacity in particular is
//! only enforced when a student enrolls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, schedule::MeetingSlot};

// ─── Departments ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
  pub department_id: Uuid,
  pub name:          String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDepartment {
  pub name: String,
}

// ─── Professors ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professor {
  pub professor_id:  Uuid,
  pub name:          String,
  pub email:         Option<String>,
  pub department_id: Option<Uuid>,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfessor {
  pub name:          String,
  #[serde(default)]
  pub email:         Option<String>,
  #[serde(default)]
  pub department_id: Option<Uuid>,
}

// ─── Rooms ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
  pub room_id:    Uuid,
  /// Short code shown on timetables, e.g. "ENG-301".
  pub name:       String,
  pub building:   Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
  pub name:     String,
  #[serde(default)]
  pub building: Option<String>,
}

// ─── Students ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:     Uuid,
  /// Institution-issued number; unique and used as the login name.
  pub student_number: String,
  pub name:           String,
  pub department_id:  Option<Uuid>,
  pub grade:          Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::RegistrarStore::add_student`].
///
/// `password_hash` is an argon2 PHC string; the store keeps it opaque.
#[derive(Debug, Clone)]
pub struct NewStudent {
  pub student_number: String,
  pub name:           String,
  pub department_id:  Option<Uuid>,
  pub grade:          Option<String>,
  pub password_hash:  Option<String>,
}

/// What the server needs to authenticate a student.
#[derive(Debug, Clone)]
pub struct StudentLogin {
  pub student_id:    Uuid,
  pub password_hash: Option<String>,
}

// ─── Subjects ────────────────────────────────────────────────────────────────

/// A subject offering. Subject and section are the same record here: each
/// subject carries its own capacity and weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:    Uuid,
  pub name:          String,
  pub credits:       u32,
  /// Hard ceiling on live enrollments.
  pub capacity:      u32,
  pub semester:      String,
  /// `None` until a professor is assigned.
  pub professor_id:  Option<Uuid>,
  pub department_id: Option<Uuid>,
  pub created_at:    DateTime<Utc>,
  pub schedule:      Vec<MeetingSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
  pub name:          String,
  pub credits:       u32,
  pub capacity:      u32,
  pub semester:      String,
  #[serde(default)]
  pub professor_id:  Option<Uuid>,
  #[serde(default)]
  pub department_id: Option<Uuid>,
}

impl NewSubject {
  pub fn validate(&self) -> Result<()> {
    if self.capacity == 0 {
      return Err(Error::ZeroCapacity(self.capacity));
    }
    if self.name.trim().is_empty() {
      return Err(Error::InvalidRequest("subject name is empty".into()));
    }
    Ok(())
  }
}

/// Partial update for a subject. Absent fields are left untouched.
///
/// `professor_id` distinguishes "leave as is" (`None`) from "unassign"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectPatch {
  pub name:          Option<String>,
  pub credits:       Option<u32>,
  pub capacity:      Option<u32>,
  pub semester:      Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "::serde_with::rust::double_option"
  )]
  pub professor_id:  Option<Option<Uuid>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "::serde_with::rust::double_option"
  )]
  pub department_id: Option<Option<Uuid>>,
}

impl SubjectPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(capacity) = self.capacity
      && capacity == 0
    {
      return Err(Error::ZeroCapacity(capacity));
    }
    if let Some(name) = &self.name
      && name.trim().is_empty()
    {
      return Err(Error::InvalidRequest("subject name is empty".into()));
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.credits.is_none()
      && self.capacity.is_none()
      && self.semester.is_none()
      && self.professor_id.is_none()
      && self.department_id.is_none()
  }
}

/// A subject together with its seat counters, as shown on browse pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectListing {
  #[serde(flatten)]
  pub subject:   Subject,
  pub enrolled:  u32,
  pub remaining: u32,
}

impl SubjectListing {
  pub fn new(subject: Subject, enrolled: u32) -> Self {
    let remaining = subject.capacity.saturating_sub(enrolled);
    Self { subject, enrolled, remaining }
  }

  pub fn is_full(&self) -> bool { self.remaining == 0 }
}
