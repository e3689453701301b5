//! SQL schema for the registrar SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS departments (
    department_id TEXT PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS professors (
    professor_id  TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT,
    department_id TEXT REFERENCES departments(department_id) ON DELETE SET NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rooms (
    room_id    TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    building   TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    student_number TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    department_id  TEXT REFERENCES departments(department_id) ON DELETE SET NULL,
    grade          TEXT,
    password_hash  TEXT,             -- argon2 PHC string; never returned by reads
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    credits       INTEGER NOT NULL CHECK (credits >= 0),
    capacity      INTEGER NOT NULL CHECK (capacity > 0),
    semester      TEXT NOT NULL,
    professor_id  TEXT REFERENCES professors(professor_id) ON DELETE SET NULL,
    department_id TEXT REFERENCES departments(department_id) ON DELETE SET NULL,
    created_at    TEXT NOT NULL
);

-- Weekly meetings. weekday: 0 = Monday .. 6 = Sunday.
-- Times are seconds since midnight; the interval is [start_second, end_second).
CREATE TABLE IF NOT EXISTS meeting_slots (
    slot_id      TEXT PRIMARY KEY,
    subject_id   TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    weekday      INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),
    start_second INTEGER NOT NULL CHECK (start_second >= 0),
    end_second   INTEGER NOT NULL CHECK (end_second < 86400),
    room_id      TEXT REFERENCES rooms(room_id) ON DELETE SET NULL,
    CHECK (start_second < end_second)
);

-- Live enrollments only; cancellation deletes the row.
CREATE TABLE IF NOT EXISTS enrollments (
    enrollment_id TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
    subject_id    TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    enrolled_at   TEXT NOT NULL,
    UNIQUE (student_id, subject_id)
);

CREATE INDEX IF NOT EXISTS meeting_slots_subject_idx ON meeting_slots(subject_id);
CREATE INDEX IF NOT EXISTS enrollments_subject_idx   ON enrollments(subject_id);

PRAGMA user_version = 1;
";
