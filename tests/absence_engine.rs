//! Exercises the aggregation / classification / transition chain against an
//! in-memory database.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use scol_backend::absence::{self, NewProfessorAbsence, NewStudentAbsence, ThresholdStatus};
use scol_backend::db;
use scol_backend::entity::user::Role;
use scol_backend::entity::{module, professor_profile, student_profile, user};
use scol_backend::error::AppError;

async fn setup() -> DatabaseConnection {
    // A single pooled connection, or every statement may land on a fresh
    // in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await.expect("in-memory sqlite");
    db::init_schema(&db).await;
    db
}

async fn seed_user(db: &DatabaseConnection, email: &str, role: Role) -> user::Model {
    user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("x".to_string()),
        role: Set(role),
        is_active: Set(true),
        is_first_login: Set(false),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

async fn seed_student(db: &DatabaseConnection, email: &str, nce: &str) -> student_profile::Model {
    let user = seed_user(db, email, Role::Student).await;
    student_profile::ActiveModel {
        user_id: Set(user.id),
        student_id: Set(nce.to_string()),
        first_name: Set("Amine".to_string()),
        last_name: Set("Trabelsi".to_string()),
        current_semester: Set(1),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert student profile")
}

async fn seed_professor(db: &DatabaseConnection, email: &str, matricule: &str) -> professor_profile::Model {
    let user = seed_user(db, email, Role::Professor).await;
    professor_profile::ActiveModel {
        user_id: Set(user.id),
        employee_id: Set(matricule.to_string()),
        first_name: Set("Leila".to_string()),
        last_name: Set("Ben Salah".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert professor profile")
}

async fn seed_module(db: &DatabaseConnection, code: &str, threshold: f64) -> module::Model {
    module::ActiveModel {
        code: Set(code.to_string()),
        name: Set(format!("Module {}", code)),
        total_hours: Set(42.0),
        absence_threshold: Set(threshold),
        credits: Set(3),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert module")
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date")
}

fn new_absence(
    student_id: i32,
    module_id: i32,
    date: NaiveDate,
    hours: f64,
    is_justified: bool,
) -> NewStudentAbsence {
    NewStudentAbsence {
        student_id,
        module_id,
        date,
        hours,
        reason: None,
        is_justified,
        recorded_by_id: None,
    }
}

#[tokio::test]
async fn aggregate_excludes_justified_by_default() {
    let db = setup().await;
    let student = seed_student(&db, "s1@gestionscol.tn", "NCE001").await;
    let module = seed_module(&db, "PROG1", 10.0).await;

    absence::record_student_absence(&db, new_absence(student.id, module.id, day(1), 3.0, false))
        .await
        .expect("unjustified absence");
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(2), 2.0, true))
        .await
        .expect("justified absence");

    let unjustified = absence::student_absence_hours(&db, student.id, Some(module.id), false)
        .await
        .expect("sum");
    assert_eq!(unjustified, 3.0);

    let all = absence::student_absence_hours(&db, student.id, Some(module.id), true)
        .await
        .expect("sum with justified");
    assert_eq!(all, 5.0);
}

#[tokio::test]
async fn aggregate_filters_by_module() {
    let db = setup().await;
    let student = seed_student(&db, "s2@gestionscol.tn", "NCE002").await;
    let prog = seed_module(&db, "PROG2", 10.0).await;
    let bdd = seed_module(&db, "BDD", 8.0).await;

    absence::record_student_absence(&db, new_absence(student.id, prog.id, day(1), 4.0, false))
        .await
        .expect("prog absence");
    absence::record_student_absence(&db, new_absence(student.id, bdd.id, day(1), 1.5, false))
        .await
        .expect("bdd absence");

    let prog_hours = absence::student_absence_hours(&db, student.id, Some(prog.id), false)
        .await
        .expect("prog sum");
    assert_eq!(prog_hours, 4.0);

    let total = absence::student_absence_hours(&db, student.id, None, false)
        .await
        .expect("total sum");
    assert_eq!(total, 5.5);
}

#[tokio::test]
async fn duplicate_student_absence_is_rejected() {
    let db = setup().await;
    let student = seed_student(&db, "s3@gestionscol.tn", "NCE003").await;
    let module = seed_module(&db, "ALGO", 12.0).await;

    absence::record_student_absence(&db, new_absence(student.id, module.id, day(5), 2.0, false))
        .await
        .expect("first record");

    let err = absence::record_student_absence(
        &db,
        new_absence(student.id, module.id, day(5), 4.0, false),
    )
    .await
    .expect_err("same (student, module, date) must be rejected");
    assert!(matches!(err, AppError::Duplicate { .. }));

    // Another date is still fine.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(6), 4.0, false))
        .await
        .expect("different date");
}

#[tokio::test]
async fn threshold_chain_notifies_on_transitions_only() {
    let db = setup().await;
    let student = seed_student(&db, "s4@gestionscol.tn", "NCE004").await;
    let module = seed_module(&db, "WEB", 10.0).await;

    // 4h: under the 50% cut, nothing to notify.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(1), 4.0, false))
        .await
        .expect("record");
    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 10.0, 4.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.total_hours, 4.0);
    assert_eq!(eval.status, ThresholdStatus::Ok);
    assert_eq!(eval.triggered(), None);

    // +1h reaches exactly 50%: warning fires.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(2), 1.0, false))
        .await
        .expect("record");
    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 10.0, 1.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.total_hours, 5.0);
    assert_eq!(eval.status, ThresholdStatus::Warning);
    assert_eq!(eval.triggered(), Some(ThresholdStatus::Warning));

    // +2h stays inside the warning band: no repeat mail.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(3), 2.0, false))
        .await
        .expect("record");
    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 10.0, 2.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.status, ThresholdStatus::Warning);
    assert_eq!(eval.triggered(), None);

    // +3h lands on the threshold: exceeded fires exactly once.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(4), 3.0, false))
        .await
        .expect("record");
    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 10.0, 3.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.total_hours, 10.0);
    assert_eq!(eval.status, ThresholdStatus::Exceeded);
    assert_eq!(eval.triggered(), Some(ThresholdStatus::Exceeded));
}

#[tokio::test]
async fn justified_absence_never_triggers_notification() {
    let db = setup().await;
    let student = seed_student(&db, "s5@gestionscol.tn", "NCE005").await;
    let module = seed_module(&db, "MATH", 10.0).await;

    absence::record_student_absence(&db, new_absence(student.id, module.id, day(1), 4.5, false))
        .await
        .expect("record");
    // A justified day right before the warning boundary adds nothing.
    absence::record_student_absence(&db, new_absence(student.id, module.id, day(2), 6.0, true))
        .await
        .expect("record justified");

    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 10.0, 0.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.total_hours, 4.5);
    assert_eq!(eval.status, ThresholdStatus::Ok);
    assert_eq!(eval.triggered(), None);
}

#[tokio::test]
async fn zero_threshold_module_never_escalates() {
    let db = setup().await;
    let student = seed_student(&db, "s6@gestionscol.tn", "NCE006").await;
    let module = seed_module(&db, "SEM", 0.0).await;

    absence::record_student_absence(&db, new_absence(student.id, module.id, day(1), 12.0, false))
        .await
        .expect("record");
    let eval = absence::evaluate_student_absence(&db, student.id, module.id, 0.0, 12.0, 50.0)
        .await
        .expect("evaluate");
    assert_eq!(eval.status, ThresholdStatus::Ok);
    assert_eq!(eval.triggered(), None);
}

#[tokio::test]
async fn professor_absences_unique_per_date_and_summed_in_days() {
    let db = setup().await;
    let professor = seed_professor(&db, "p1@gestionscol.tn", "EMP001").await;

    let record = |date: NaiveDate, hours: f64| NewProfessorAbsence {
        professor_id: professor.id,
        date,
        hours,
        reason: None,
        is_justified: false,
        recorded_by_id: None,
    };

    absence::record_professor_absence(&db, record(day(10), 8.0))
        .await
        .expect("first day");
    absence::record_professor_absence(&db, record(day(11), 4.0))
        .await
        .expect("second day");

    let err = absence::record_professor_absence(&db, record(day(10), 2.0))
        .await
        .expect_err("one record per professor and date");
    assert!(matches!(err, AppError::Duplicate { .. }));

    let hours = absence::professor_absence_hours(&db, professor.id, false)
        .await
        .expect("sum");
    assert_eq!(hours, 12.0);
    assert_eq!(absence::hours_to_days(hours), 1.5);
}
