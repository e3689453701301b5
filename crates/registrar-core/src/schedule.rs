//! Weekly meeting slots and the overlap rule used for time-conflict checks.

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── TimeRange ───────────────────────────────────────────────────────────────

/// A half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
  pub start: NaiveTime,
  pub end:   NaiveTime,
}

impl TimeRange {
  /// Build a range, rejecting empty or inverted intervals.
  pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
    if start >= end {
      return Err(Error::EmptyMeeting { start, end });
    }
    Ok(Self { start, end })
  }

  /// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
  ///
  /// Back-to-back ranges (`e1 == s2`) do not overlap.
  pub fn overlaps(&self, other: &TimeRange) -> bool {
    self.start < other.end && other.start < self.end
  }
}

// ─── MeetingSlot ─────────────────────────────────────────────────────────────

/// One weekly meeting of a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSlot {
  pub slot_id:    Uuid,
  pub subject_id: Uuid,
  pub day:        Weekday,
  #[serde(flatten)]
  pub time:       TimeRange,
  /// `None` while no room has been allocated.
  pub room_id:    Option<Uuid>,
}

impl MeetingSlot {
  /// Two slots clash when they fall on the same weekday and their time
  /// ranges overlap.
  pub fn clashes_with(&self, other: &MeetingSlot) -> bool {
    self.day == other.day && self.time.overlaps(&other.time)
  }
}

/// Input to [`crate::store::RegistrarStore::add_meeting`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
  pub day:     Weekday,
  pub start:   NaiveTime,
  pub end:     NaiveTime,
  #[serde(default)]
  pub room_id: Option<Uuid>,
}

impl NewMeeting {
  /// Validated time range. Sub-second times are rejected rather than
  /// truncated, so what is stored is exactly what was asked for.
  pub fn time_range(&self) -> Result<TimeRange> {
    for t in [self.start, self.end] {
      if t.nanosecond() != 0 {
        return Err(Error::FractionalSeconds(t));
      }
    }
    TimeRange::new(self.start, self.end)
  }
}

/// The first slot in `held` that clashes with any slot in `wanted`.
pub fn first_clash<'a>(held: &'a [MeetingSlot], wanted: &[MeetingSlot]) -> Option<&'a MeetingSlot> {
  held.iter().find(|h| wanted.iter().any(|w| w.clashes_with(h)))
}
