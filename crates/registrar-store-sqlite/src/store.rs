//! [`SqliteStore`], the SQLite implementation of [`RegistrarStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use registrar_core::{
  admission::{AdmissionPolicy, Decision, decide},
  catalog::{
    Department, NewDepartment, NewProfessor, NewRoom, NewStudent, NewSubject,
    Professor, Room, Student, StudentLogin, Subject, SubjectListing,
    SubjectPatch,
  },
  enrollment::{CancelOutcome, EnrollOutcome, Enrollment, EnrollmentDetail},
  schedule::{MeetingSlot, NewMeeting},
  store::{RegistrarStore, SubjectQuery},
};

use crate::{
  Error, Result,
  encode::{
    RawDepartment, RawEnrollment, RawProfessor, RawRoom, RawSeats, RawSlot,
    RawSnapshot, RawStudent, RawSubject, decode_count, decode_slots,
    decode_uuid, encode_dt, encode_time, encode_uuid, encode_weekday,
    is_unique_violation,
  },
  schema::SCHEMA,
};

/// How long a connection waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SUBJECT_COLUMNS: &str = "s.subject_id, s.name, s.credits, s.capacity, s.semester,
   s.professor_id, s.department_id, s.created_at";

const SLOT_COLUMNS: &str =
  "m.slot_id, m.subject_id, m.weekday, m.start_second, m.end_second, m.room_id";

// ─── Row helpers ─────────────────────────────────────────────────────────────

const DEPARTMENT_COLUMNS: &str = "department_id, name, created_at";

const PROFESSOR_COLUMNS: &str = "professor_id, name, email, department_id, created_at";

const ROOM_COLUMNS: &str = "room_id, name, building, created_at";

const STUDENT_COLUMNS: &str =
  "student_id, student_number, name, department_id, grade, created_at";

const ENROLLMENT_COLUMNS: &str = "enrollment_id, student_id, subject_id, enrolled_at";

fn raw_department(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDepartment> {
  Ok(RawDepartment {
    department_id: row.get(0)?,
    name:          row.get(1)?,
    created_at:    row.get(2)?,
  })
}

fn raw_professor(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfessor> {
  Ok(RawProfessor {
    professor_id:  row.get(0)?,
    name:          row.get(1)?,
    email:         row.get(2)?,
    department_id: row.get(3)?,
    created_at:    row.get(4)?,
  })
}

fn raw_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRoom> {
  Ok(RawRoom {
    room_id:    row.get(0)?,
    name:       row.get(1)?,
    building:   row.get(2)?,
    created_at: row.get(3)?,
  })
}

fn raw_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEnrollment> {
  Ok(RawEnrollment {
    enrollment_id: row.get(0)?,
    student_id:    row.get(1)?,
    subject_id:    row.get(2)?,
    enrolled_at:   row.get(3)?,
  })
}

fn raw_subject(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubject> {
  Ok(RawSubject {
    subject_id:    row.get(0)?,
    name:          row.get(1)?,
    credits:       row.get(2)?,
    capacity:      row.get(3)?,
    semester:      row.get(4)?,
    professor_id:  row.get(5)?,
    department_id: row.get(6)?,
    created_at:    row.get(7)?,
  })
}

fn raw_slot(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSlot> {
  Ok(RawSlot {
    slot_id:      row.get(0)?,
    subject_id:   row.get(1)?,
    weekday:      row.get(2)?,
    start_second: row.get(3)?,
    end_second:   row.get(4)?,
    room_id:      row.get(5)?,
  })
}

fn raw_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawStudent> {
  Ok(RawStudent {
    student_id:     row.get(0)?,
    student_number: row.get(1)?,
    name:           row.get(2)?,
    department_id:  row.get(3)?,
    grade:          row.get(4)?,
    created_at:     row.get(5)?,
  })
}

/// Tables that other records point at.
#[derive(Debug, Clone, Copy)]
enum Table {
  Departments,
  Professors,
  Rooms,
  Students,
  Subjects,
}

impl Table {
  fn exists_sql(self) -> &'static str {
    match self {
      Self::Departments => "SELECT 1 FROM departments WHERE department_id = ?1",
      Self::Professors => "SELECT 1 FROM professors WHERE professor_id = ?1",
      Self::Rooms => "SELECT 1 FROM rooms WHERE room_id = ?1",
      Self::Students => "SELECT 1 FROM students WHERE student_id = ?1",
      Self::Subjects => "SELECT 1 FROM subjects WHERE subject_id = ?1",
    }
  }

  fn entity(self) -> &'static str {
    match self {
      Self::Departments => "department",
      Self::Professors => "professor",
      Self::Rooms => "room",
      Self::Students => "student",
      Self::Subjects => "subject",
    }
  }
}

fn row_exists(conn: &rusqlite::Connection, table: Table, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(table.exists_sql(), rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

/// The not-found error for the first reference that does not resolve.
/// `None` references are skipped.
fn first_missing(
  conn: &rusqlite::Connection,
  refs: &[(Table, Option<Uuid>)],
) -> rusqlite::Result<Option<Error>> {
  for (table, id) in refs {
    if let Some(id) = id
      && !row_exists(conn, *table, &encode_uuid(*id))?
    {
      return Ok(Some(Error::NotFound { entity: table.entity(), id: *id }));
    }
  }
  Ok(None)
}

fn load_slots(conn: &rusqlite::Connection, subject_id: &str) -> rusqlite::Result<Vec<RawSlot>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {SLOT_COLUMNS} FROM meeting_slots m
     WHERE m.subject_id = ?1
     ORDER BY m.weekday, m.start_second"
  ))?;
  stmt
    .query_map(rusqlite::params![subject_id], raw_slot)?
    .collect()
}

/// Escape `LIKE` wildcards so user text matches literally under
/// `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

fn page_bound(name: &str, value: usize) -> Result<i64> {
  i64::try_from(value).map_err(|_| {
    Error::Core(registrar_core::Error::InvalidRequest(format!("{name} out of range: {value}")))
  })
}

/// Read everything [`decide`] needs. Must run inside the admission
/// transaction.
fn read_snapshot(
  conn: &rusqlite::Connection,
  student_id: &str,
  subject_id: &str,
  policy: AdmissionPolicy,
) -> rusqlite::Result<RawSnapshot> {
  let already_enrolled = conn
    .query_row(
      "SELECT 1 FROM enrollments WHERE student_id = ?1 AND subject_id = ?2",
      rusqlite::params![student_id, subject_id],
      |_| Ok(()),
    )
    .optional()?
    .is_some();

  if already_enrolled {
    return Ok(RawSnapshot { already_enrolled, seats: None, held: vec![] });
  }

  let capacity: Option<i64> = conn
    .query_row(
      "SELECT capacity FROM subjects WHERE subject_id = ?1",
      rusqlite::params![subject_id],
      |r| r.get(0),
    )
    .optional()?;

  let Some(capacity) = capacity else {
    return Ok(RawSnapshot { already_enrolled, seats: None, held: vec![] });
  };

  let enrolled: i64 = conn.query_row(
    "SELECT COUNT(*) FROM enrollments WHERE subject_id = ?1",
    rusqlite::params![subject_id],
    |r| r.get(0),
  )?;

  let seats = RawSeats { capacity, enrolled, schedule: load_slots(conn, subject_id)? };

  let held = if policy.check_time_conflicts {
    let mut stmt = conn.prepare_cached(&format!(
      "SELECT {SLOT_COLUMNS}
       FROM meeting_slots m
       JOIN enrollments e ON e.subject_id = m.subject_id
       WHERE e.student_id = ?1"
    ))?;
    stmt
      .query_map(rusqlite::params![student_id], raw_slot)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  } else {
    vec![]
  };

  Ok(RawSnapshot { already_enrolled, seats: Some(seats), held })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registrar store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. Several
/// `SqliteStore`s may open the same file; admissions are serialized by
/// SQLite's write lock.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(?path, "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RegistrarStore impl ─────────────────────────────────────────────────────

impl RegistrarStore for SqliteStore {
  type Error = Error;

  // ── Departments, professors, rooms ──────────────────────────────────────

  async fn add_department(&self, input: NewDepartment) -> Result<Department> {
    let department = Department {
      department_id: Uuid::new_v4(),
      name:          input.name,
      created_at:    Utc::now(),
    };

    let id_str = encode_uuid(department.department_id);
    let name   = department.name.clone();
    let at_str = encode_dt(department.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO departments (department_id, name, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::Duplicate(format!("department name {:?}", department.name)));
    }
    Ok(department)
  }

  async fn list_departments(&self) -> Result<Vec<Department>> {
    let raws: Vec<RawDepartment> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY name"))?;
        let rows = stmt
          .query_map([], raw_department)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDepartment::into_department).collect()
  }

  async fn update_department(&self, id: Uuid, input: NewDepartment) -> Result<Option<Department>> {
    let id_str = encode_uuid(id);
    let name   = input.name;

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<Option<RawDepartment>>> {
        match conn.execute(
          "UPDATE departments SET name = ?2 WHERE department_id = ?1",
          rusqlite::params![id_str, name],
        ) {
          Ok(0) => return Ok(Ok(None)),
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(Error::Duplicate(format!("department name {name:?}"))));
          }
          Err(e) => return Err(e.into()),
        }
        let raw = conn.query_row(
          &format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE department_id = ?1"),
          rusqlite::params![id_str],
          raw_department,
        )?;
        Ok(Ok(Some(raw)))
      })
      .await??;

    raw.map(RawDepartment::into_department).transpose()
  }

  async fn delete_department(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM departments WHERE department_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn add_professor(&self, input: NewProfessor) -> Result<Professor> {
    let professor = Professor {
      professor_id:  Uuid::new_v4(),
      name:          input.name,
      email:         input.email,
      department_id: input.department_id,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(professor.professor_id);
    let name     = professor.name.clone();
    let email    = professor.email.clone();
    let dept_id  = professor.department_id;
    let dept_str = dept_id.map(encode_uuid);
    let at_str   = encode_dt(professor.created_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<()>> {
        if let Some(err) = first_missing(conn, &[(Table::Departments, dept_id)])? {
          return Ok(Err(err));
        }
        conn.execute(
          "INSERT INTO professors (professor_id, name, email, department_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, email, dept_str, at_str],
        )?;
        Ok(Ok(()))
      })
      .await??;

    Ok(professor)
  }

  async fn list_professors(&self) -> Result<Vec<Professor>> {
    let raws: Vec<RawProfessor> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {PROFESSOR_COLUMNS} FROM professors ORDER BY name"))?;
        let rows = stmt
          .query_map([], raw_professor)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfessor::into_professor).collect()
  }

  async fn update_professor(&self, id: Uuid, input: NewProfessor) -> Result<Option<Professor>> {
    let id_str   = encode_uuid(id);
    let dept_id  = input.department_id;
    let dept_str = dept_id.map(encode_uuid);

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<Option<RawProfessor>>> {
        let tx = conn.transaction()?;
        if !row_exists(&tx, Table::Professors, &id_str)? {
          return Ok(Ok(None));
        }
        if let Some(err) = first_missing(&tx, &[(Table::Departments, dept_id)])? {
          return Ok(Err(err));
        }
        tx.execute(
          "UPDATE professors SET name = ?2, email = ?3, department_id = ?4
           WHERE professor_id = ?1",
          rusqlite::params![id_str, input.name, input.email, dept_str],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {PROFESSOR_COLUMNS} FROM professors WHERE professor_id = ?1"),
          rusqlite::params![id_str],
          raw_professor,
        )?;
        tx.commit()?;
        Ok(Ok(Some(raw)))
      })
      .await??;

    raw.map(RawProfessor::into_professor).transpose()
  }

  async fn delete_professor(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM professors WHERE professor_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn add_room(&self, input: NewRoom) -> Result<Room> {
    let room = Room {
      room_id:    Uuid::new_v4(),
      name:       input.name,
      building:   input.building,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(room.room_id);
    let name     = room.name.clone();
    let building = room.building.clone();
    let at_str   = encode_dt(room.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO rooms (room_id, name, building, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, building, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::Duplicate(format!("room name {:?}", room.name)));
    }
    Ok(room)
  }

  async fn list_rooms(&self) -> Result<Vec<Room>> {
    let raws: Vec<RawRoom> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY name"))?;
        let rows = stmt
          .query_map([], raw_room)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRoom::into_room).collect()
  }

  async fn update_room(&self, id: Uuid, input: NewRoom) -> Result<Option<Room>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<Option<RawRoom>>> {
        match conn.execute(
          "UPDATE rooms SET name = ?2, building = ?3 WHERE room_id = ?1",
          rusqlite::params![id_str, input.name, input.building],
        ) {
          Ok(0) => return Ok(Ok(None)),
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(Error::Duplicate(format!("room name {:?}", input.name))));
          }
          Err(e) => return Err(e.into()),
        }
        let raw = conn.query_row(
          &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE room_id = ?1"),
          rusqlite::params![id_str],
          raw_room,
        )?;
        Ok(Ok(Some(raw)))
      })
      .await??;

    raw.map(RawRoom::into_room).transpose()
  }

  async fn delete_room(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM rooms WHERE room_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Students ────────────────────────────────────────────────────────────

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    let student = Student {
      student_id:     Uuid::new_v4(),
      student_number: input.student_number,
      name:           input.name,
      department_id:  input.department_id,
      grade:          input.grade,
      created_at:     Utc::now(),
    };

    let id_str        = encode_uuid(student.student_id);
    let number        = student.student_number.clone();
    let name          = student.name.clone();
    let dept_id       = student.department_id;
    let dept_str      = dept_id.map(encode_uuid);
    let grade         = student.grade.clone();
    let password_hash = input.password_hash;
    let at_str        = encode_dt(student.created_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<()>> {
        if let Some(err) = first_missing(conn, &[(Table::Departments, dept_id)])? {
          return Ok(Err(err));
        }
        match conn.execute(
          "INSERT INTO students (
             student_id, student_number, name, department_id, grade,
             password_hash, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, number, name, dept_str, grade, password_hash, at_str],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_unique_violation(&e) => {
            Ok(Err(Error::Duplicate(format!("student number {number:?}"))))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await??;

    Ok(student)
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1"),
              rusqlite::params![id_str],
              raw_student,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws: Vec<RawStudent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STUDENT_COLUMNS} FROM students ORDER BY student_number"
        ))?;
        let rows = stmt
          .query_map([], raw_student)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn update_student(&self, id: Uuid, input: NewStudent) -> Result<Option<Student>> {
    let id_str   = encode_uuid(id);
    let dept_id  = input.department_id;
    let dept_str = dept_id.map(encode_uuid);

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<Option<RawStudent>>> {
        let tx = conn.transaction()?;
        if !row_exists(&tx, Table::Students, &id_str)? {
          return Ok(Ok(None));
        }
        if let Some(err) = first_missing(&tx, &[(Table::Departments, dept_id)])? {
          return Ok(Err(err));
        }
        match tx.execute(
          "UPDATE students SET
             student_number = ?2,
             name           = ?3,
             department_id  = ?4,
             grade          = ?5,
             password_hash  = COALESCE(?6, password_hash)
           WHERE student_id = ?1",
          rusqlite::params![
            id_str,
            input.student_number,
            input.name,
            dept_str,
            input.grade,
            input.password_hash,
          ],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            let number = &input.student_number;
            return Ok(Err(Error::Duplicate(format!("student number {number:?}"))));
          }
          Err(e) => return Err(e.into()),
        }
        let raw = tx.query_row(
          &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1"),
          rusqlite::params![id_str],
          raw_student,
        )?;
        tx.commit()?;
        Ok(Ok(Some(raw)))
      })
      .await??;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn delete_student(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM students WHERE student_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    if deleted > 0 {
      tracing::debug!(student_id = %id, "student deleted with enrollments");
    }
    Ok(deleted > 0)
  }

  async fn student_login(&self, student_number: &str) -> Result<Option<StudentLogin>> {
    let number = student_number.to_owned();

    let row: Option<(String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT student_id, password_hash FROM students WHERE student_number = ?1",
              rusqlite::params![number],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(id, password_hash)| {
        Ok(StudentLogin { student_id: decode_uuid(&id)?, password_hash })
      })
      .transpose()
  }

  // ── Subjects and schedules ──────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    input.validate()?;

    let subject = Subject {
      subject_id:    Uuid::new_v4(),
      name:          input.name,
      credits:       input.credits,
      capacity:      input.capacity,
      semester:      input.semester,
      professor_id:  input.professor_id,
      department_id: input.department_id,
      created_at:    Utc::now(),
      schedule:      vec![],
    };

    let id_str   = encode_uuid(subject.subject_id);
    let name     = subject.name.clone();
    let credits  = i64::from(subject.credits);
    let capacity = i64::from(subject.capacity);
    let semester = subject.semester.clone();
    let prof_id  = subject.professor_id;
    let dept_id  = subject.department_id;
    let at_str   = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<()>> {
        let refs = [(Table::Professors, prof_id), (Table::Departments, dept_id)];
        if let Some(err) = first_missing(conn, &refs)? {
          return Ok(Err(err));
        }
        conn.execute(
          "INSERT INTO subjects (
             subject_id, name, credits, capacity, semester,
             professor_id, department_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            name,
            credits,
            capacity,
            semester,
            prof_id.map(encode_uuid),
            dept_id.map(encode_uuid),
            at_str,
          ],
        )?;
        Ok(Ok(()))
      })
      .await??;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawSubject, Vec<RawSlot>)> = self
      .conn
      .call(move |conn| {
        let subject = conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects s WHERE s.subject_id = ?1"),
            rusqlite::params![id_str],
            raw_subject,
          )
          .optional()?;
        match subject {
          Some(s) => Ok(Some((s, load_slots(conn, &id_str)?))),
          None => Ok(None),
        }
      })
      .await?;

    raw
      .map(|(s, slots)| s.into_subject(decode_slots(slots)?))
      .transpose()
  }

  async fn list_subjects(&self, query: &SubjectQuery) -> Result<Vec<SubjectListing>> {
    let text_pattern = query.text.as_deref().map(|t| format!("%{}%", escape_like(t)));
    let dept_str     = query.department_id.map(encode_uuid);
    let prof_str     = query.professor_id.map(encode_uuid);
    let semester     = query.semester.clone();
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val    = query.limit.map_or(Ok(-1), |l| page_bound("limit", l))?;
    let offset_val   = query.offset.map_or(Ok(0), |o| page_bound("offset", o))?;

    let raws: Vec<(RawSubject, i64, Vec<RawSlot>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS},
             (SELECT COUNT(*) FROM enrollments e WHERE e.subject_id = s.subject_id)
           FROM subjects s
           WHERE (?1 IS NULL OR s.name LIKE ?1 ESCAPE '\\')
             AND (?2 IS NULL OR s.department_id = ?2)
             AND (?3 IS NULL OR s.professor_id = ?3)
             AND (?4 IS NULL OR s.semester = ?4)
           ORDER BY s.name, s.subject_id
           LIMIT ?5 OFFSET ?6"
        ))?;

        let rows = stmt
          .query_map(
            rusqlite::params![
              text_pattern.as_deref(),
              dept_str.as_deref(),
              prof_str.as_deref(),
              semester.as_deref(),
              limit_val,
              offset_val,
            ],
            |row| Ok((raw_subject(row)?, row.get::<_, i64>(8)?)),
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (subject, enrolled) in rows {
          let slots = load_slots(conn, &subject.subject_id)?;
          out.push((subject, enrolled, slots));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(subject, enrolled, slots)| {
        Ok(SubjectListing::new(
          subject.into_subject(decode_slots(slots)?)?,
          decode_count(enrolled)?,
        ))
      })
      .collect()
  }

  async fn update_subject(&self, id: Uuid, patch: SubjectPatch) -> Result<Option<Subject>> {
    patch.validate()?;

    let id_str   = encode_uuid(id);
    let name     = patch.name;
    let credits  = patch.credits.map(i64::from);
    let capacity = patch.capacity.map(i64::from);
    let semester = patch.semester;
    let set_prof = patch.professor_id.is_some();
    let prof_id  = patch.professor_id.flatten();
    let set_dept = patch.department_id.is_some();
    let dept_id  = patch.department_id.flatten();

    let updated = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<bool>> {
        let tx = conn.transaction()?;
        if !row_exists(&tx, Table::Subjects, &id_str)? {
          return Ok(Ok(false));
        }
        let refs = [(Table::Professors, prof_id), (Table::Departments, dept_id)];
        if let Some(err) = first_missing(&tx, &refs)? {
          return Ok(Err(err));
        }
        tx.execute(
          "UPDATE subjects SET
             name          = COALESCE(?2, name),
             credits       = COALESCE(?3, credits),
             capacity      = COALESCE(?4, capacity),
             semester      = COALESCE(?5, semester),
             professor_id  = CASE WHEN ?6 THEN ?7 ELSE professor_id END,
             department_id = CASE WHEN ?8 THEN ?9 ELSE department_id END
           WHERE subject_id = ?1",
          rusqlite::params![
            id_str,
            name,
            credits,
            capacity,
            semester,
            set_prof,
            prof_id.map(encode_uuid),
            set_dept,
            dept_id.map(encode_uuid),
          ],
        )?;
        tx.commit()?;
        Ok(Ok(true))
      })
      .await??;

    if !updated {
      return Ok(None);
    }
    self.get_subject(id).await
  }

  async fn delete_subject(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn add_meeting(&self, subject_id: Uuid, input: NewMeeting) -> Result<MeetingSlot> {
    let slot = MeetingSlot {
      slot_id: Uuid::new_v4(),
      subject_id,
      day: input.day,
      time: input.time_range()?,
      room_id: input.room_id,
    };

    let slot_str    = encode_uuid(slot.slot_id);
    let subject_str = encode_uuid(subject_id);
    let weekday     = encode_weekday(slot.day);
    let start       = encode_time(slot.time.start);
    let end         = encode_time(slot.time.end);
    let room_id     = slot.room_id;

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<()>> {
        let refs = [(Table::Subjects, Some(subject_id)), (Table::Rooms, room_id)];
        if let Some(err) = first_missing(conn, &refs)? {
          return Ok(Err(err));
        }
        conn.execute(
          "INSERT INTO meeting_slots (
             slot_id, subject_id, weekday, start_second, end_second, room_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            slot_str,
            subject_str,
            weekday,
            start,
            end,
            room_id.map(encode_uuid),
          ],
        )?;
        Ok(Ok(()))
      })
      .await??;

    Ok(slot)
  }

  async fn remove_meeting(&self, slot_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(slot_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM meeting_slots WHERE slot_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Directory queries ───────────────────────────────────────────────────

  async fn count_live_enrollments(&self, subject_id: Uuid) -> Result<u32> {
    let id_str = encode_uuid(subject_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM enrollments WHERE subject_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    decode_count(count)
  }

  async fn get_schedule(&self, subject_id: Uuid) -> Result<Vec<MeetingSlot>> {
    let id_str = encode_uuid(subject_id);
    let raws = self
      .conn
      .call(move |conn| Ok(load_slots(conn, &id_str)?))
      .await?;
    decode_slots(raws)
  }

  async fn student_exists(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    Ok(
      self
        .conn
        .call(move |conn| Ok(row_exists(conn, Table::Students, &id_str)?))
        .await?,
    )
  }

  async fn live_enrollments(&self, student_id: Uuid) -> Result<Vec<EnrollmentDetail>> {
    let id_str = encode_uuid(student_id);

    let raws: Vec<(RawEnrollment, String, Option<String>, Vec<RawSlot>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.enrollment_id, e.student_id, e.subject_id, e.enrolled_at,
                  s.name, s.professor_id
           FROM enrollments e
           JOIN subjects s ON s.subject_id = e.subject_id
           WHERE e.student_id = ?1
           ORDER BY e.enrolled_at, e.enrollment_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((
              raw_enrollment(row)?,
              row.get::<_, String>(4)?,
              row.get::<_, Option<String>>(5)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (enrollment, name, professor_id) in rows {
          let slots = load_slots(conn, &enrollment.subject_id)?;
          out.push((enrollment, name, professor_id, slots));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(enrollment, subject_name, professor_id, slots)| {
        Ok(EnrollmentDetail {
          enrollment: enrollment.into_enrollment()?,
          subject_name,
          professor_id: professor_id.as_deref().map(decode_uuid).transpose()?,
          schedule: decode_slots(slots)?,
        })
      })
      .collect()
  }

  async fn list_enrollments(&self) -> Result<Vec<Enrollment>> {
    let raws: Vec<RawEnrollment> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENROLLMENT_COLUMNS} FROM enrollments ORDER BY enrolled_at, enrollment_id"
        ))?;
        let rows = stmt
          .query_map([], raw_enrollment)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnrollment::into_enrollment).collect()
  }

  // ── Admission ───────────────────────────────────────────────────────────

  async fn admit(
    &self,
    student_id: Uuid,
    subject_id: Uuid,
    policy:     AdmissionPolicy,
  ) -> Result<EnrollOutcome> {
    let enrollment = Enrollment {
      enrollment_id: Uuid::new_v4(),
      student_id,
      subject_id,
      enrolled_at: Utc::now(),
    };

    let enrollment_str = encode_uuid(enrollment.enrollment_id);
    let student_str    = encode_uuid(student_id);
    let subject_str    = encode_uuid(subject_id);
    let at_str         = encode_dt(enrollment.enrolled_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Result<EnrollOutcome>> {
        // IMMEDIATE takes the write lock before the count is read, so no
        // other admission can commit between the check and the insert.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let snapshot = match read_snapshot(&tx, &student_str, &subject_str, policy)?
          .into_snapshot()
        {
          Ok(s) => s,
          Err(e) => return Ok(Err(e)),
        };

        if let Decision::Reject(outcome) = decide(&policy, &snapshot) {
          return Ok(Ok(outcome));
        }

        match tx.execute(
          "INSERT INTO enrollments (enrollment_id, student_id, subject_id, enrolled_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![enrollment_str, student_str, subject_str, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Ok(EnrollOutcome::AlreadyEnrolled));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(Ok(EnrollOutcome::Enrolled { enrollment }))
      })
      .await?
  }

  async fn withdraw(&self, student_id: Uuid, subject_id: Uuid) -> Result<CancelOutcome> {
    let student_str = encode_uuid(student_id);
    let subject_str = encode_uuid(subject_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM enrollments WHERE student_id = ?1 AND subject_id = ?2",
          rusqlite::params![student_str, subject_str],
        )?)
      })
      .await?;

    Ok(if deleted > 0 { CancelOutcome::Cancelled } else { CancelOutcome::NotEnrolled })
  }
}
