//! Enrollment records and the outcomes of enroll/cancel requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::MeetingSlot;

/// A live join fact between one student and one subject. Never updated in
/// place; it is created by a successful admission and destroyed by
/// cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub enrollment_id: Uuid,
  pub student_id:    Uuid,
  pub subject_id:    Uuid,
  pub enrolled_at:   DateTime<Utc>,
}

/// An enrollment joined with what a student needs to see on a timetable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentDetail {
  #[serde(flatten)]
  pub enrollment:   Enrollment,
  pub subject_name: String,
  pub professor_id: Option<Uuid>,
  pub schedule:     Vec<MeetingSlot>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of an admission decision. Every variant except [`Enrolled`] is a
/// business-rule rejection that left the store untouched.
///
/// [`Enrolled`]: EnrollOutcome::Enrolled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollOutcome {
  Enrolled { enrollment: Enrollment },
  AlreadyEnrolled,
  SubjectNotFound,
  CapacityExceeded,
  /// The requested subject overlaps a subject the student already holds.
  TimeConflict { conflicting_subject_id: Uuid },
}

impl EnrollOutcome {
  pub fn is_enrolled(&self) -> bool { matches!(self, Self::Enrolled { .. }) }

  /// Stable snake_case name of the outcome.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Enrolled { .. } => "enrolled",
      Self::AlreadyEnrolled => "already_enrolled",
      Self::SubjectNotFound => "subject_not_found",
      Self::CapacityExceeded => "capacity_exceeded",
      Self::TimeConflict { .. } => "time_conflict",
    }
  }

  /// User-facing message for the outcome.
  pub fn message(&self) -> &'static str {
    match self {
      Self::Enrolled { .. } => "enrollment completed",
      Self::AlreadyEnrolled => "already enrolled in this subject",
      Self::SubjectNotFound => "subject does not exist",
      Self::CapacityExceeded => "enrollment capacity exceeded",
      Self::TimeConflict { .. } => {
        "schedule conflict with an existing enrollment"
      }
    }
  }
}

/// Result of a cancellation request. Cancelling twice yields `Cancelled`
/// then `NotEnrolled`; neither is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
  Cancelled,
  NotEnrolled,
}

impl CancelOutcome {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Cancelled => "cancelled",
      Self::NotEnrolled => "not_enrolled",
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Self::Cancelled => "enrollment cancelled",
      Self::NotEnrolled => "not enrolled in this subject",
    }
  }
}
