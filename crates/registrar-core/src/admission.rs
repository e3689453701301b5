//! Enrollment admission control.
//!
//! The decision itself is the pure function [`decide`], evaluated over an
//! [`AdmissionSnapshot`] that the store reads inside the same write
//! transaction that inserts the enrollment. [`AdmissionController`] is the
//! entry point used by the HTTP layer: it validates the request, delegates
//! the atomic read-decide-write to [`RegistrarStore::admit`], and keeps
//! business rejections apart from infrastructure failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  enrollment::{CancelOutcome, EnrollOutcome},
  schedule::{MeetingSlot, first_clash},
  store::RegistrarStore,
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Checks enabled for an admission controller; fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
  /// Reject enrollments whose schedule overlaps a subject the student
  /// already holds.
  pub check_time_conflicts: bool,
}

impl Default for AdmissionPolicy {
  fn default() -> Self { Self { check_time_conflicts: true } }
}

impl AdmissionPolicy {
  /// Duplicate and capacity checks only.
  pub fn capacity_only() -> Self { Self { check_time_conflicts: false } }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Seat state of the requested subject at decision time.
#[derive(Debug, Clone)]
pub struct SeatState {
  pub capacity: u32,
  /// Live enrollments counted inside the admission transaction.
  pub enrolled: u32,
  pub schedule: Vec<MeetingSlot>,
}

/// Everything [`decide`] looks at, read in one transaction.
#[derive(Debug, Clone)]
pub struct AdmissionSnapshot {
  pub already_enrolled: bool,
  /// `None` if the subject does not exist.
  pub subject:          Option<SeatState>,
  /// Meeting slots of every subject the student currently holds. Stores may
  /// leave this empty when the policy does not check time conflicts.
  pub held:             Vec<MeetingSlot>,
}

/// What the store should do with an admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Admit,
  /// A business-rule rejection; never [`EnrollOutcome::Enrolled`].
  Reject(EnrollOutcome),
}

/// Apply the admission checks in order, stopping at the first failure:
/// duplicate, existence, capacity, then (if enabled) time conflict.
pub fn decide(policy: &AdmissionPolicy, snapshot: &AdmissionSnapshot) -> Decision {
  if snapshot.already_enrolled {
    return Decision::Reject(EnrollOutcome::AlreadyEnrolled);
  }

  let Some(seats) = &snapshot.subject else {
    return Decision::Reject(EnrollOutcome::SubjectNotFound);
  };

  if seats.enrolled >= seats.capacity {
    return Decision::Reject(EnrollOutcome::CapacityExceeded);
  }

  if policy.check_time_conflicts
    && let Some(held) = first_clash(&snapshot.held, &seats.schedule)
  {
    return Decision::Reject(EnrollOutcome::TimeConflict {
      conflicting_subject_id: held.subject_id,
    });
  }

  Decision::Admit
}

// ─── Controller ──────────────────────────────────────────────────────────────

/// Accepts enroll and cancel requests on behalf of an already-authorized
/// caller.
///
/// Cloning is cheap; the store is shared.
pub struct AdmissionController<S> {
  store:  Arc<S>,
  policy: AdmissionPolicy,
}

impl<S> Clone for AdmissionController<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy }
  }
}

impl<S: RegistrarStore> AdmissionController<S> {
  pub fn new(store: Arc<S>, policy: AdmissionPolicy) -> Self {
    Self { store, policy }
  }

  /// Decide and, on acceptance, persist one enrollment.
  ///
  /// Returns `Err` only for requests that could not be evaluated: an
  /// unknown student ([`Error::InvalidRequest`]) or a store failure
  /// ([`Error::Infrastructure`]). Rejections are `Ok` outcomes.
  pub async fn enroll(&self, student_id: Uuid, subject_id: Uuid) -> Result<EnrollOutcome> {
    self.require_student(student_id).await?;

    let outcome = self
      .store
      .admit(student_id, subject_id, self.policy)
      .await
      .map_err(|e| {
        tracing::error!(%student_id, %subject_id, error = %e, "admission failed");
        Error::infrastructure(e)
      })?;

    if outcome.is_enrolled() {
      tracing::info!(%student_id, %subject_id, "enrollment admitted");
    } else {
      tracing::debug!(
        %student_id, %subject_id, outcome = outcome.kind(),
        "enrollment rejected"
      );
    }
    Ok(outcome)
  }

  /// Remove the enrollment for `(student_id, subject_id)` if it exists.
  pub async fn cancel(&self, student_id: Uuid, subject_id: Uuid) -> Result<CancelOutcome> {
    self.require_student(student_id).await?;

    let outcome = self
      .store
      .withdraw(student_id, subject_id)
      .await
      .map_err(|e| {
        tracing::error!(%student_id, %subject_id, error = %e, "withdrawal failed");
        Error::infrastructure(e)
      })?;

    tracing::info!(%student_id, %subject_id, outcome = outcome.kind(), "cancellation processed");
    Ok(outcome)
  }

  async fn require_student(&self, student_id: Uuid) -> Result<()> {
    let exists = self
      .store
      .student_exists(student_id)
      .await
      .map_err(Error::infrastructure)?;
    if !exists {
      return Err(Error::InvalidRequest(format!("unknown student {student_id}")));
    }
    Ok(())
  }
}
