//! Typed authorization evaluated once at the request boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "student_id", rename_all = "snake_case")]
pub enum Principal {
  Admin,
  Student(Uuid),
}

/// Something a request needs permission to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
  /// Create, edit, or delete catalog records.
  ManageCatalog,
  /// Enroll or cancel on behalf of the given student.
  EnrollFor(Uuid),
  /// Read the given student's enrollments.
  ViewStudent(Uuid),
}

impl Principal {
  /// Admins hold every capability (administrative override); a student
  /// may only act on their own record.
  pub fn can(&self, capability: &Capability) -> bool {
    match (self, capability) {
      (Self::Admin, _) => true,
      (Self::Student(_), Capability::ManageCatalog) => false,
      (Self::Student(me), Capability::EnrollFor(id))
      | (Self::Student(me), Capability::ViewStudent(id)) => me == id,
    }
  }

  pub fn authorize(&self, capability: Capability) -> Result<()> {
    if self.can(&capability) {
      Ok(())
    } else {
      Err(Error::Forbidden)
    }
  }

  /// The student this principal acts as, if any.
  pub fn student_id(&self) -> Option<Uuid> {
    match self {
      Self::Admin => None,
      Self::Student(id) => Some(*id),
    }
  }
}
