//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::sync::Arc;

use chrono::{NaiveTime, Weekday};
use registrar_core::{
  admission::{AdmissionController, AdmissionPolicy},
  catalog::{
    NewDepartment, NewProfessor, NewRoom, NewStudent, NewSubject, Subject,
    SubjectPatch,
  },
  enrollment::{CancelOutcome, EnrollOutcome},
  schedule::NewMeeting,
  store::{RegistrarStore, StoreError, StoreErrorKind, SubjectQuery},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

async fn student(s: &SqliteStore, number: &str) -> Uuid {
  s.add_student(NewStudent {
    student_number: number.into(),
    name:           format!("Student {number}"),
    department_id:  None,
    grade:          None,
    password_hash:  None,
  })
  .await
  .unwrap()
  .student_id
}

async fn subject(s: &SqliteStore, name: &str, capacity: u32) -> Subject {
  s.add_subject(NewSubject {
    name: name.into(),
    credits: 3,
    capacity,
    semester: "2024-1".into(),
    professor_id: None,
    department_id: None,
  })
  .await
  .unwrap()
}

async fn meets(s: &SqliteStore, subject_id: Uuid, day: Weekday, from: NaiveTime, to: NaiveTime) {
  s.add_meeting(subject_id, NewMeeting { day, start: from, end: to, room_id: None })
    .await
    .unwrap();
}

async fn enroll(s: &SqliteStore, student_id: Uuid, subject_id: Uuid) -> EnrollOutcome {
  s.admit(student_id, subject_id, AdmissionPolicy::default())
    .await
    .unwrap()
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_names_rejected() {
  let s = store().await;

  s.add_department(NewDepartment { name: "Physics".into() }).await.unwrap();
  let err = s
    .add_department(NewDepartment { name: "Physics".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");

  s.add_room(NewRoom { name: "B-101".into(), building: None }).await.unwrap();
  let err = s
    .add_room(NewRoom { name: "B-101".into(), building: Some("B".into()) })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");

  assert_eq!(s.list_departments().await.unwrap().len(), 1);
  assert_eq!(s.list_rooms().await.unwrap().len(), 1);
}

#[tokio::test]
async fn professor_with_unknown_department_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();

  let err = s
    .add_professor(NewProfessor {
      name:          "Dr. Kim".into(),
      email:         None,
      department_id: Some(missing),
    })
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert!(s.list_professors().await.unwrap().is_empty());
}

#[tokio::test]
async fn student_number_is_unique() {
  let s = store().await;
  student(&s, "20240001").await;

  let err = s
    .add_student(NewStudent {
      student_number: "20240001".into(),
      name:           "Someone Else".into(),
      department_id:  None,
      grade:          None,
      password_hash:  None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");
}

#[tokio::test]
async fn student_login_returns_hash() {
  let s = store().await;
  let created = s
    .add_student(NewStudent {
      student_number: "20240002".into(),
      name:           "Lee".into(),
      department_id:  None,
      grade:          Some("2".into()),
      password_hash:  Some("$argon2id$stub".into()),
    })
    .await
    .unwrap();

  let login = s.student_login("20240002").await.unwrap().unwrap();
  assert_eq!(login.student_id, created.student_id);
  assert_eq!(login.password_hash.as_deref(), Some("$argon2id$stub"));

  assert!(s.student_login("nobody").await.unwrap().is_none());

  let fetched = s.get_student(created.student_id).await.unwrap().unwrap();
  assert_eq!(fetched.grade.as_deref(), Some("2"));
  assert!(s.student_exists(created.student_id).await.unwrap());
  assert!(!s.student_exists(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn update_department_and_room_enforce_unique_names() {
  let s = store().await;
  let physics = s.add_department(NewDepartment { name: "Physics".into() }).await.unwrap();
  s.add_department(NewDepartment { name: "Chemistry".into() }).await.unwrap();

  let renamed = s
    .update_department(physics.department_id, NewDepartment { name: "Applied Physics".into() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(renamed.name, "Applied Physics");
  assert_eq!(renamed.created_at, physics.created_at);

  let err = s
    .update_department(physics.department_id, NewDepartment { name: "Chemistry".into() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");

  let missing = s
    .update_department(Uuid::new_v4(), NewDepartment { name: "Nowhere".into() })
    .await
    .unwrap();
  assert!(missing.is_none());

  let room = s.add_room(NewRoom { name: "B-101".into(), building: None }).await.unwrap();
  let moved = s
    .update_room(room.room_id, NewRoom { name: "C-201".into(), building: Some("C".into()) })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(moved.name, "C-201");
  assert_eq!(moved.building.as_deref(), Some("C"));
}

#[tokio::test]
async fn update_professor_checks_department() {
  let s = store().await;
  let prof = s
    .add_professor(NewProfessor { name: "Dr. Kim".into(), email: None, department_id: None })
    .await
    .unwrap();

  let err = s
    .update_professor(prof.professor_id, NewProfessor {
      name:          "Dr. Kim".into(),
      email:         None,
      department_id: Some(Uuid::new_v4()),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "department", .. }), "got {err:?}");

  let dept = s.add_department(NewDepartment { name: "Math".into() }).await.unwrap();
  let updated = s
    .update_professor(prof.professor_id, NewProfessor {
      name:          "Dr. Kim Min".into(),
      email:         Some("kim@example.edu".into()),
      department_id: Some(dept.department_id),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.name, "Dr. Kim Min");
  assert_eq!(updated.department_id, Some(dept.department_id));
}

#[tokio::test]
async fn update_student_keeps_password_unless_given() {
  let s = store().await;
  let created = s
    .add_student(NewStudent {
      student_number: "20240010".into(),
      name:           "Park".into(),
      department_id:  None,
      grade:          Some("1".into()),
      password_hash:  Some("$argon2id$old".into()),
    })
    .await
    .unwrap();
  student(&s, "20240011").await;

  let updated = s
    .update_student(created.student_id, NewStudent {
      student_number: "20240010".into(),
      name:           "Park Ji".into(),
      department_id:  None,
      grade:          Some("2".into()),
      password_hash:  None,
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.name, "Park Ji");
  assert_eq!(updated.grade.as_deref(), Some("2"));
  let login = s.student_login("20240010").await.unwrap().unwrap();
  assert_eq!(login.password_hash.as_deref(), Some("$argon2id$old"));

  let err = s
    .update_student(created.student_id, NewStudent {
      student_number: "20240011".into(),
      name:           "Park Ji".into(),
      department_id:  None,
      grade:          None,
      password_hash:  None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got {err:?}");
}

#[tokio::test]
async fn deletes_follow_foreign_key_rules() {
  let s = store().await;
  let dept = s.add_department(NewDepartment { name: "CS".into() }).await.unwrap();
  let prof = s
    .add_professor(NewProfessor {
      name:          "Dr. Lee".into(),
      email:         None,
      department_id: Some(dept.department_id),
    })
    .await
    .unwrap();
  let room = s.add_room(NewRoom { name: "E-301".into(), building: None }).await.unwrap();
  let sub = s
    .add_subject(NewSubject {
      name:          "Operating Systems".into(),
      credits:       3,
      capacity:      10,
      semester:      "2024-1".into(),
      professor_id:  Some(prof.professor_id),
      department_id: Some(dept.department_id),
    })
    .await
    .unwrap();
  s.add_meeting(sub.subject_id, NewMeeting {
    day:     Weekday::Mon,
    start:   at(9, 0),
    end:     at(10, 0),
    room_id: Some(room.room_id),
  })
  .await
  .unwrap();
  let st = student(&s, "1").await;
  assert!(enroll(&s, st, sub.subject_id).await.is_enrolled());

  assert!(s.delete_department(dept.department_id).await.unwrap());
  assert!(s.delete_professor(prof.professor_id).await.unwrap());
  assert!(s.delete_room(room.room_id).await.unwrap());
  assert!(!s.delete_room(room.room_id).await.unwrap());

  let kept = s.get_subject(sub.subject_id).await.unwrap().unwrap();
  assert_eq!(kept.professor_id, None);
  assert_eq!(kept.department_id, None);
  assert_eq!(kept.schedule.len(), 1);
  assert_eq!(kept.schedule[0].room_id, None);

  assert_eq!(s.list_enrollments().await.unwrap().len(), 1);
  assert!(s.delete_student(st).await.unwrap());
  assert!(!s.delete_student(st).await.unwrap());
  assert!(s.list_enrollments().await.unwrap().is_empty());
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 0);
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_capacity_subject_rejected() {
  let s = store().await;
  let err = s
    .add_subject(NewSubject {
      name:          "Empty".into(),
      credits:       1,
      capacity:      0,
      semester:      "2024-1".into(),
      professor_id:  None,
      department_id: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(registrar_core::Error::ZeroCapacity(0))));
}

#[tokio::test]
async fn subject_with_unknown_professor_is_not_found() {
  let s = store().await;
  let err = s
    .add_subject(NewSubject {
      name:          "Orphan".into(),
      credits:       3,
      capacity:      10,
      semester:      "2024-1".into(),
      professor_id:  Some(Uuid::new_v4()),
      department_id: None,
    })
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn get_subject_includes_ordered_schedule() {
  let s = store().await;
  let sub = subject(&s, "Algorithms", 30).await;
  meets(&s, sub.subject_id, Weekday::Wed, at(9, 0), at(10, 30)).await;
  meets(&s, sub.subject_id, Weekday::Mon, at(13, 0), at(14, 0)).await;

  let fetched = s.get_subject(sub.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Algorithms");
  assert_eq!(fetched.schedule.len(), 2);
  assert_eq!(fetched.schedule[0].day, Weekday::Mon);
  assert_eq!(fetched.schedule[1].time.end, at(10, 30));

  assert!(s.get_subject(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn inverted_meeting_rejected() {
  let s = store().await;
  let sub = subject(&s, "Backwards", 10).await;

  let err = s
    .add_meeting(sub.subject_id, NewMeeting {
      day:     Weekday::Tue,
      start:   at(11, 0),
      end:     at(10, 0),
      room_id: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(registrar_core::Error::EmptyMeeting { .. })));
  assert!(s.get_schedule(sub.subject_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sub_second_meeting_is_invalid_input() {
  let s = store().await;
  let sub = subject(&s, "Precise", 10).await;
  let at = |h, ms| NaiveTime::from_hms_milli_opt(h, 0, 0, ms).unwrap();

  // Both ends fall inside the same whole second.
  let err = s
    .add_meeting(sub.subject_id, NewMeeting {
      day:     Weekday::Mon,
      start:   at(10, 200),
      end:     at(10, 800),
      room_id: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(registrar_core::Error::FractionalSeconds(_))), "got {err:?}");
  assert_eq!(err.kind(), StoreErrorKind::Invalid);

  let err = s
    .add_meeting(sub.subject_id, NewMeeting {
      day:     Weekday::Tue,
      start:   at(9, 500),
      end:     at(10, 0),
      room_id: None,
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Invalid);
  assert!(s.get_schedule(sub.subject_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn meeting_for_unknown_subject_or_room_is_not_found() {
  let s = store().await;
  let err = s
    .add_meeting(Uuid::new_v4(), NewMeeting {
      day:     Weekday::Tue,
      start:   at(10, 0),
      end:     at(11, 0),
      room_id: None,
    })
    .await
    .unwrap_err();
  assert!(err.is_not_found());

  let sub = subject(&s, "Roomless", 10).await;
  let err = s
    .add_meeting(sub.subject_id, NewMeeting {
      day:     Weekday::Tue,
      start:   at(10, 0),
      end:     at(11, 0),
      room_id: Some(Uuid::new_v4()),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "room", .. }));
}

#[tokio::test]
async fn remove_meeting() {
  let s = store().await;
  let sub = subject(&s, "Databases", 10).await;
  let slot = s
    .add_meeting(sub.subject_id, NewMeeting {
      day:     Weekday::Thu,
      start:   at(15, 0),
      end:     at(16, 0),
      room_id: None,
    })
    .await
    .unwrap();

  assert!(s.remove_meeting(slot.slot_id).await.unwrap());
  assert!(!s.remove_meeting(slot.slot_id).await.unwrap());
  assert!(s.get_schedule(sub.subject_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_subjects_filters_and_counts() {
  let s = store().await;
  let algo = subject(&s, "Algorithms", 2).await;
  subject(&s, "Linear Algebra", 40).await;
  s.add_subject(NewSubject {
    name:          "Compilers".into(),
    credits:       3,
    capacity:      20,
    semester:      "2024-2".into(),
    professor_id:  None,
    department_id: None,
  })
  .await
  .unwrap();

  let a = student(&s, "1").await;
  let b = student(&s, "2").await;
  enroll(&s, a, algo.subject_id).await;
  enroll(&s, b, algo.subject_id).await;

  let all = s.list_subjects(&SubjectQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);
  let names: Vec<_> = all.iter().map(|l| l.subject.name.as_str()).collect();
  assert_eq!(names, ["Algorithms", "Compilers", "Linear Algebra"]);

  let listing = &all[0];
  assert_eq!(listing.enrolled, 2);
  assert_eq!(listing.remaining, 0);
  assert!(listing.is_full());

  let by_text = s
    .list_subjects(&SubjectQuery { text: Some("ALG".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_text.len(), 2);

  let by_semester = s
    .list_subjects(&SubjectQuery { semester: Some("2024-2".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(by_semester.len(), 1);
  assert_eq!(by_semester[0].subject.name, "Compilers");

  let page = s
    .list_subjects(&SubjectQuery { limit: Some(1), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].subject.name, "Compilers");
}

#[tokio::test]
async fn text_search_matches_wildcards_literally() {
  let s = store().await;
  subject(&s, "100% Rust", 10).await;
  subject(&s, "Rust 101", 10).await;
  subject(&s, "snake_case", 10).await;
  subject(&s, "snakeXcase", 10).await;

  let by = |text: &str| SubjectQuery { text: Some(text.into()), ..Default::default() };

  let hits = s.list_subjects(&by("%")).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].subject.name, "100% Rust");

  let hits = s.list_subjects(&by("e_c")).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].subject.name, "snake_case");
}

#[tokio::test]
async fn oversized_page_bounds_are_invalid() {
  let s = store().await;
  let err = s
    .list_subjects(&SubjectQuery { offset: Some(usize::MAX), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Invalid);

  let err = s
    .list_subjects(&SubjectQuery { limit: Some(usize::MAX), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Invalid);
}

#[tokio::test]
async fn update_subject_applies_patch() {
  let s = store().await;
  let prof = s
    .add_professor(NewProfessor { name: "Dr. Park".into(), email: None, department_id: None })
    .await
    .unwrap();
  let sub = s
    .add_subject(NewSubject {
      name:          "Networks".into(),
      credits:       3,
      capacity:      25,
      semester:      "2024-1".into(),
      professor_id:  Some(prof.professor_id),
      department_id: None,
    })
    .await
    .unwrap();

  let updated = s
    .update_subject(sub.subject_id, SubjectPatch {
      capacity: Some(30),
      professor_id: Some(None),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.capacity, 30);
  assert_eq!(updated.name, "Networks");
  assert_eq!(updated.professor_id, None);

  let missing = s
    .update_subject(Uuid::new_v4(), SubjectPatch { credits: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert!(missing.is_none());

  let err = s
    .update_subject(sub.subject_id, SubjectPatch { capacity: Some(0), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(registrar_core::Error::ZeroCapacity(0))));
}

#[tokio::test]
async fn delete_subject_cascades() {
  let s = store().await;
  let sub = subject(&s, "Ethics", 10).await;
  meets(&s, sub.subject_id, Weekday::Fri, at(9, 0), at(10, 0)).await;
  let st = student(&s, "1").await;
  enroll(&s, st, sub.subject_id).await;

  assert!(s.delete_subject(sub.subject_id).await.unwrap());
  assert!(!s.delete_subject(sub.subject_id).await.unwrap());
  assert!(s.get_schedule(sub.subject_id).await.unwrap().is_empty());
  assert!(s.live_enrollments(st).await.unwrap().is_empty());
}

// ─── Admission ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn enroll_then_duplicate() {
  let s = store().await;
  let st = student(&s, "1").await;
  let sub = subject(&s, "Calculus", 10).await;

  let outcome = enroll(&s, st, sub.subject_id).await;
  let EnrollOutcome::Enrolled { enrollment } = outcome else {
    panic!("expected enrolled, got {outcome:?}");
  };
  assert_eq!(enrollment.student_id, st);
  assert_eq!(enrollment.subject_id, sub.subject_id);

  assert_eq!(enroll(&s, st, sub.subject_id).await, EnrollOutcome::AlreadyEnrolled);
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_subject_not_found() {
  let s = store().await;
  let st = student(&s, "1").await;
  assert_eq!(enroll(&s, st, Uuid::new_v4()).await, EnrollOutcome::SubjectNotFound);
}

#[tokio::test]
async fn full_subject_rejected() {
  let s = store().await;
  let sub = subject(&s, "Seminar", 1).await;
  let a = student(&s, "1").await;
  let b = student(&s, "2").await;

  assert!(enroll(&s, a, sub.subject_id).await.is_enrolled());
  assert_eq!(enroll(&s, b, sub.subject_id).await, EnrollOutcome::CapacityExceeded);
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 1);
}

#[tokio::test]
async fn lowered_capacity_blocks_new_admissions() {
  let s = store().await;
  let sub = subject(&s, "Studio", 3).await;
  for n in ["1", "2", "3"] {
    let st = student(&s, n).await;
    assert!(enroll(&s, st, sub.subject_id).await.is_enrolled());
  }

  s.update_subject(sub.subject_id, SubjectPatch { capacity: Some(1), ..Default::default() })
    .await
    .unwrap();

  let late = student(&s, "4").await;
  assert_eq!(enroll(&s, late, sub.subject_id).await, EnrollOutcome::CapacityExceeded);
  // Existing enrollments are kept.
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 3);
}

#[tokio::test]
async fn overlapping_schedule_rejected() {
  let s = store().await;
  let st = student(&s, "1").await;
  let held = subject(&s, "Physics", 10).await;
  let wanted = subject(&s, "Chemistry", 10).await;
  meets(&s, held.subject_id, Weekday::Mon, at(9, 0), at(10, 30)).await;
  meets(&s, wanted.subject_id, Weekday::Mon, at(10, 0), at(11, 0)).await;

  assert!(enroll(&s, st, held.subject_id).await.is_enrolled());
  assert_eq!(
    enroll(&s, st, wanted.subject_id).await,
    EnrollOutcome::TimeConflict { conflicting_subject_id: held.subject_id }
  );
  assert_eq!(s.count_live_enrollments(wanted.subject_id).await.unwrap(), 0);
}

#[tokio::test]
async fn back_to_back_schedule_admitted() {
  let s = store().await;
  let st = student(&s, "1").await;
  let first = subject(&s, "Morning", 10).await;
  let second = subject(&s, "Late Morning", 10).await;
  meets(&s, first.subject_id, Weekday::Tue, at(9, 0), at(10, 30)).await;
  meets(&s, second.subject_id, Weekday::Tue, at(10, 30), at(12, 0)).await;

  assert!(enroll(&s, st, first.subject_id).await.is_enrolled());
  assert!(enroll(&s, st, second.subject_id).await.is_enrolled());
}

#[tokio::test]
async fn capacity_only_policy_admits_overlap() {
  let s = store().await;
  let st = student(&s, "1").await;
  let a = subject(&s, "A", 10).await;
  let b = subject(&s, "B", 10).await;
  meets(&s, a.subject_id, Weekday::Fri, at(13, 0), at(15, 0)).await;
  meets(&s, b.subject_id, Weekday::Fri, at(14, 0), at(16, 0)).await;

  let policy = AdmissionPolicy::capacity_only();
  assert!(s.admit(st, a.subject_id, policy).await.unwrap().is_enrolled());
  assert!(s.admit(st, b.subject_id, policy).await.unwrap().is_enrolled());
}

#[tokio::test]
async fn cancel_frees_seat() {
  let s = store().await;
  let sub = subject(&s, "Tiny", 1).await;
  let a = student(&s, "1").await;
  let b = student(&s, "2").await;

  assert!(enroll(&s, a, sub.subject_id).await.is_enrolled());
  assert_eq!(enroll(&s, b, sub.subject_id).await, EnrollOutcome::CapacityExceeded);

  assert_eq!(s.withdraw(a, sub.subject_id).await.unwrap(), CancelOutcome::Cancelled);
  assert_eq!(s.withdraw(a, sub.subject_id).await.unwrap(), CancelOutcome::NotEnrolled);

  assert!(enroll(&s, b, sub.subject_id).await.is_enrolled());
}

#[tokio::test]
async fn same_student_can_reenroll_after_cancel() {
  let s = store().await;
  let st = student(&s, "1").await;
  let sub = subject(&s, "Calculus", 10).await;

  assert!(enroll(&s, st, sub.subject_id).await.is_enrolled());
  assert_eq!(s.withdraw(st, sub.subject_id).await.unwrap(), CancelOutcome::Cancelled);
  assert!(enroll(&s, st, sub.subject_id).await.is_enrolled());
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 1);
}

#[tokio::test]
async fn waiting_student_takes_freed_seat() {
  let s = store().await;
  let sub = subject(&s, "Pair", 2).await;
  let a = student(&s, "A").await;
  let b = student(&s, "B").await;
  let c = student(&s, "C").await;

  assert!(enroll(&s, a, sub.subject_id).await.is_enrolled());
  assert!(enroll(&s, b, sub.subject_id).await.is_enrolled());
  assert_eq!(enroll(&s, c, sub.subject_id).await, EnrollOutcome::CapacityExceeded);

  assert_eq!(s.withdraw(a, sub.subject_id).await.unwrap(), CancelOutcome::Cancelled);
  assert!(enroll(&s, c, sub.subject_id).await.is_enrolled());
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 2);
}

#[tokio::test]
async fn live_enrollments_carry_subject_details() {
  let s = store().await;
  let st = student(&s, "1").await;
  let sub = subject(&s, "Statistics", 10).await;
  meets(&s, sub.subject_id, Weekday::Thu, at(11, 0), at(12, 0)).await;
  enroll(&s, st, sub.subject_id).await;

  let held = s.live_enrollments(st).await.unwrap();
  assert_eq!(held.len(), 1);
  assert_eq!(held[0].subject_name, "Statistics");
  assert_eq!(held[0].enrollment.subject_id, sub.subject_id);
  assert_eq!(held[0].schedule.len(), 1);
}

// ─── Controller ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn controller_rejects_unknown_student() {
  let s = Arc::new(store().await);
  let sub = subject(&s, "Logic", 10).await;
  let controller = AdmissionController::new(Arc::clone(&s), AdmissionPolicy::default());

  let err = controller.enroll(Uuid::new_v4(), sub.subject_id).await.unwrap_err();
  assert!(matches!(err, registrar_core::Error::InvalidRequest(_)));

  let err = controller.cancel(Uuid::new_v4(), sub.subject_id).await.unwrap_err();
  assert!(matches!(err, registrar_core::Error::InvalidRequest(_)));
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 0);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_never_oversubscribe() {
  const CAPACITY: u32 = 5;

  let s = store().await;
  let sub = subject(&s, "Popular", CAPACITY).await;
  let mut students = Vec::new();
  for n in 0..CAPACITY * 2 {
    students.push(student(&s, &n.to_string()).await);
  }

  let tasks: Vec<_> = students
    .into_iter()
    .map(|st| {
      let s = s.clone();
      tokio::spawn(async move { enroll(&s, st, sub.subject_id).await })
    })
    .collect();

  let mut admitted = 0;
  let mut full = 0;
  for task in tasks {
    match task.await.unwrap() {
      EnrollOutcome::Enrolled { .. } => admitted += 1,
      EnrollOutcome::CapacityExceeded => full += 1,
      other => panic!("unexpected outcome {other:?}"),
    }
  }

  assert_eq!(admitted, CAPACITY);
  assert_eq!(full, CAPACITY);
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), CAPACITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_admit_once() {
  let s = store().await;
  let sub = subject(&s, "Once", 10).await;
  let st = student(&s, "1").await;

  let tasks: Vec<_> = (0..8)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { enroll(&s, st, sub.subject_id).await })
    })
    .collect();

  let mut admitted = 0;
  for task in tasks {
    match task.await.unwrap() {
      EnrollOutcome::Enrolled { .. } => admitted += 1,
      EnrollOutcome::AlreadyEnrolled => {}
      other => panic!("unexpected outcome {other:?}"),
    }
  }

  assert_eq!(admitted, 1);
  assert_eq!(s.count_live_enrollments(sub.subject_id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admissions_are_atomic_across_connections() {
  const CAPACITY: u32 = 4;

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("registrar.db");
  let first = SqliteStore::open(&path).await.unwrap();
  let second = SqliteStore::open(&path).await.unwrap();

  let sub = subject(&first, "Shared", CAPACITY).await;
  let mut students = Vec::new();
  for n in 0..CAPACITY * 2 {
    students.push(student(&first, &n.to_string()).await);
  }

  let tasks: Vec<_> = students
    .into_iter()
    .enumerate()
    .map(|(i, st)| {
      let s = if i % 2 == 0 { first.clone() } else { second.clone() };
      tokio::spawn(async move { enroll(&s, st, sub.subject_id).await })
    })
    .collect();

  let mut admitted = 0;
  for task in tasks {
    if task.await.unwrap().is_enrolled() {
      admitted += 1;
    }
  }

  assert_eq!(admitted, CAPACITY);
  assert_eq!(second.count_live_enrollments(sub.subject_id).await.unwrap(), CAPACITY);
}
