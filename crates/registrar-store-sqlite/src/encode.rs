//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Weekdays are integers counted from Monday and
//! times of day are whole seconds since midnight.

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use registrar_core::{
  admission::{AdmissionSnapshot, SeatState},
  catalog::{Department, Professor, Room, Student, Subject},
  enrollment::Enrollment,
  schedule::{MeetingSlot, TimeRange},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Weekday and time of day ──────────────────────────────────────────────────

pub fn encode_weekday(day: Weekday) -> i64 { i64::from(day.num_days_from_monday()) }

pub fn decode_weekday(n: i64) -> Result<Weekday> {
  match n {
    0 => Ok(Weekday::Mon),
    1 => Ok(Weekday::Tue),
    2 => Ok(Weekday::Wed),
    3 => Ok(Weekday::Thu),
    4 => Ok(Weekday::Fri),
    5 => Ok(Weekday::Sat),
    6 => Ok(Weekday::Sun),
    other => Err(Error::Decode(format!("weekday out of range: {other}"))),
  }
}

/// Sub-second precision is dropped.
pub fn encode_time(t: NaiveTime) -> i64 { i64::from(t.num_seconds_from_midnight()) }

pub fn decode_time(secs: i64) -> Result<NaiveTime> {
  u32::try_from(secs)
    .ok()
    .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0))
    .ok_or_else(|| Error::Decode(format!("time of day out of range: {secs}")))
}

pub fn decode_count(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("count out of range: {n}")))
}

// ─── SQLite error classification ──────────────────────────────────────────────

/// True if `e` is a `UNIQUE` or `PRIMARY KEY` constraint failure.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `departments` row.
pub struct RawDepartment {
  pub department_id: String,
  pub name:          String,
  pub created_at:    String,
}

impl RawDepartment {
  pub fn into_department(self) -> Result<Department> {
    Ok(Department {
      department_id: decode_uuid(&self.department_id)?,
      name:          self.name,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawProfessor {
  pub professor_id:  String,
  pub name:          String,
  pub email:         Option<String>,
  pub department_id: Option<String>,
  pub created_at:    String,
}

impl RawProfessor {
  pub fn into_professor(self) -> Result<Professor> {
    Ok(Professor {
      professor_id:  decode_uuid(&self.professor_id)?,
      name:          self.name,
      email:         self.email,
      department_id: decode_opt_uuid(self.department_id)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRoom {
  pub room_id:    String,
  pub name:       String,
  pub building:   Option<String>,
  pub created_at: String,
}

impl RawRoom {
  pub fn into_room(self) -> Result<Room> {
    Ok(Room {
      room_id:    decode_uuid(&self.room_id)?,
      name:       self.name,
      building:   self.building,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawStudent {
  pub student_id:     String,
  pub student_number: String,
  pub name:           String,
  pub department_id:  Option<String>,
  pub grade:          Option<String>,
  pub created_at:     String,
}

impl RawStudent {
  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:     decode_uuid(&self.student_id)?,
      student_number: self.student_number,
      name:           self.name,
      department_id:  decode_opt_uuid(self.department_id)?,
      grade:          self.grade,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Columns of a `subjects` row; the schedule is read separately.
pub struct RawSubject {
  pub subject_id:    String,
  pub name:          String,
  pub credits:       i64,
  pub capacity:      i64,
  pub semester:      String,
  pub professor_id:  Option<String>,
  pub department_id: Option<String>,
  pub created_at:    String,
}

impl RawSubject {
  pub fn into_subject(self, schedule: Vec<MeetingSlot>) -> Result<Subject> {
    Ok(Subject {
      subject_id:    decode_uuid(&self.subject_id)?,
      name:          self.name,
      credits:       decode_count(self.credits)?,
      capacity:      decode_count(self.capacity)?,
      semester:      self.semester,
      professor_id:  decode_opt_uuid(self.professor_id)?,
      department_id: decode_opt_uuid(self.department_id)?,
      created_at:    decode_dt(&self.created_at)?,
      schedule,
    })
  }
}

pub struct RawSlot {
  pub slot_id:      String,
  pub subject_id:   String,
  pub weekday:      i64,
  pub start_second: i64,
  pub end_second:   i64,
  pub room_id:      Option<String>,
}

impl RawSlot {
  pub fn into_slot(self) -> Result<MeetingSlot> {
    let time = TimeRange::new(
      decode_time(self.start_second)?,
      decode_time(self.end_second)?,
    )?;
    Ok(MeetingSlot {
      slot_id:    decode_uuid(&self.slot_id)?,
      subject_id: decode_uuid(&self.subject_id)?,
      day:        decode_weekday(self.weekday)?,
      time,
      room_id:    decode_opt_uuid(self.room_id)?,
    })
  }
}

pub fn decode_slots(raws: Vec<RawSlot>) -> Result<Vec<MeetingSlot>> {
  raws.into_iter().map(RawSlot::into_slot).collect()
}

pub struct RawEnrollment {
  pub enrollment_id: String,
  pub student_id:    String,
  pub subject_id:    String,
  pub enrolled_at:   String,
}

impl RawEnrollment {
  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      enrollment_id: decode_uuid(&self.enrollment_id)?,
      student_id:    decode_uuid(&self.student_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      enrolled_at:   decode_dt(&self.enrolled_at)?,
    })
  }
}

/// Seat state of the requested subject, before decoding.
pub struct RawSeats {
  pub capacity: i64,
  pub enrolled: i64,
  pub schedule: Vec<RawSlot>,
}

/// Everything the admission decision reads, before decoding.
pub struct RawSnapshot {
  pub already_enrolled: bool,
  pub seats:            Option<RawSeats>,
  pub held:             Vec<RawSlot>,
}

impl RawSnapshot {
  pub fn into_snapshot(self) -> Result<AdmissionSnapshot> {
    let subject = self
      .seats
      .map(|s| -> Result<SeatState> {
        Ok(SeatState {
          capacity: decode_count(s.capacity)?,
          enrolled: decode_count(s.enrolled)?,
          schedule: decode_slots(s.schedule)?,
        })
      })
      .transpose()?;

    Ok(AdmissionSnapshot {
      already_enrolled: self.already_enrolled,
      subject,
      held: decode_slots(self.held)?,
    })
  }
}
