use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::error;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
              QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::absence::{self, NewProfessorAbsence, NewStudentAbsence, ThresholdStatus};
use crate::auth::{require_admin, AuthUser};
use crate::config::AppConfig;
use crate::entity::{module, notification_log, professor_absence, professor_profile,
                    student_absence, student_profile, user};
use crate::error::AppError;
use crate::mailer::{threshold_exceeded_mail, threshold_warning_mail, Mailer};
use crate::response::ApiResponse;
use crate::routes::threshold::global_setting;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/students")
            .route(web::post().to(create_student_absence))
            .route(web::get().to(list_student_absences)),
    )
    .service(
        web::resource("/students/{id}/toggle-justified")
            .route(web::post().to(toggle_student_absence_justified)),
    )
    .service(web::resource("/students/{id}").route(web::delete().to(delete_student_absence)))
    .service(
        web::resource("/professors")
            .route(web::post().to(create_professor_absence))
            .route(web::get().to(list_professor_absences)),
    )
    .service(web::resource("/professors/{id}").route(web::delete().to(delete_professor_absence)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStudentAbsenceRequest {
    student_id: Option<i32>,
    module_id: Option<i32>,
    date: Option<NaiveDate>,
    hours: Option<f64>,
    reason: Option<String>,
    is_justified: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStudentAbsenceResponse {
    id: i32,
    total_hours: f64,
    threshold_status: ThresholdStatus,
    notification_sent: Option<ThresholdStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStudentAbsencesQuery {
    student_id: Option<i32>,
    module_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentAbsenceDto {
    id: i32,
    student_id: i32,
    student_name: Option<String>,
    module_id: i32,
    module_name: Option<String>,
    date: String,
    hours: f64,
    reason: Option<String>,
    is_justified: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfessorAbsenceRequest {
    professor_id: Option<i32>,
    date: Option<NaiveDate>,
    hours: Option<f64>,
    reason: Option<String>,
    is_justified: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfessorAbsenceResponse {
    id: i32,
    total_hours: f64,
    total_days: f64,
    threshold_status: ThresholdStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProfessorAbsencesQuery {
    professor_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfessorAbsenceDto {
    id: i32,
    professor_id: i32,
    professor_name: Option<String>,
    date: String,
    hours: f64,
    reason: Option<String>,
    is_justified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleJustifiedResponse {
    is_justified: bool,
}

/// Records a student absence, then runs the threshold chain: recompute the
/// unjustified total, classify it, and mail the student when this record
/// crossed the warning or exceeded boundary. Mail and log failures never
/// undo the inserted record.
async fn create_student_absence(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    mailer: web::Data<Mailer>,
    auth: AuthUser,
    payload: web::Json<CreateStudentAbsenceRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let student_id = payload
        .student_id
        .ok_or_else(|| AppError::validation_field("studentId requis.", "studentId"))?;
    let module_id = payload
        .module_id
        .ok_or_else(|| AppError::validation_field("moduleId requis.", "moduleId"))?;
    let date = payload
        .date
        .ok_or_else(|| AppError::validation_field("date requise.", "date"))?;
    let hours = payload
        .hours
        .ok_or_else(|| AppError::validation_field("hours requis.", "hours"))?;
    validate::absence_hours(hours)?;
    validate::absence_date(date)?;
    let is_justified = payload.is_justified.unwrap_or(false);

    let student = student_profile::Entity::find_by_id(student_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Étudiant non trouvé.", "student"))?;
    let module = module::Entity::find_by_id(module_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Module non trouvé.", "module"))?;

    let inserted = absence::record_student_absence(
        db.get_ref(),
        NewStudentAbsence {
            student_id: student.id,
            module_id: module.id,
            date,
            hours,
            reason: payload.reason.clone(),
            is_justified,
            recorded_by_id: Some(auth.user_id),
        },
    )
    .await?;

    let added_hours = if is_justified { 0.0 } else { hours };
    let eval = absence::evaluate_student_absence(
        db.get_ref(),
        student.id,
        module.id,
        module.absence_threshold,
        added_hours,
        config.warning_percentage,
    )
    .await?;

    let mut notification_sent = None;
    if let Some(status) = eval.triggered() {
        notification_sent =
            notify_student(db.get_ref(), &mailer, &student, &module, &eval, status).await;
    }

    let response = CreateStudentAbsenceResponse {
        id: inserted.id,
        total_hours: eval.total_hours,
        threshold_status: eval.status,
        notification_sent,
    };
    Ok(HttpResponse::Created().json(ApiResponse::with_message(response, "Absence enregistrée.")))
}

/// Best-effort tail of the chain. Returns what was actually dispatched.
async fn notify_student(
    db: &DatabaseConnection,
    mailer: &Mailer,
    student: &student_profile::Model,
    module: &module::Model,
    eval: &absence::AbsenceEvaluation,
    status: ThresholdStatus,
) -> Option<ThresholdStatus> {
    let user = match user::Entity::find_by_id(student.user_id).one(db).await {
        Ok(Some(u)) => u,
        Ok(None) => return None,
        Err(e) => {
            error!("notification recipient lookup failed: {}", e);
            return None;
        }
    };

    let full_name = format!("{} {}", student.first_name, student.last_name);
    let (kind, mail) = if status == ThresholdStatus::Exceeded {
        (
            "threshold_exceeded",
            threshold_exceeded_mail(&full_name, &module.name, eval.total_hours, module.absence_threshold),
        )
    } else {
        let percentage =
            absence::absence_rate(eval.total_hours, module.absence_threshold).round() as i64;
        (
            "threshold_warning",
            threshold_warning_mail(
                &full_name,
                &module.name,
                eval.total_hours,
                module.absence_threshold,
                percentage,
            ),
        )
    };

    if let Err(e) = mailer.send(&user.email, &mail) {
        error!("failed to send threshold notification: {}", e);
    }

    let log_row = notification_log::ActiveModel {
        recipient_id: Set(user.id),
        notification_type: Set(kind.to_string()),
        subject: Set(mail.subject),
        message: Set(mail.body),
        sent_at: Set(Some(Utc::now())),
        is_read: Set(false),
        ..Default::default()
    };
    if let Err(e) = log_row.insert(db).await {
        error!("failed to record notification: {}", e);
    }

    Some(status)
}

async fn list_student_absences(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<ListStudentAbsencesQuery>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let mut finder = student_absence::Entity::find().order_by_desc(student_absence::Column::Date);
    if let Some(student_id) = query.student_id {
        finder = finder.filter(student_absence::Column::StudentId.eq(student_id));
    }
    if let Some(module_id) = query.module_id {
        finder = finder.filter(student_absence::Column::ModuleId.eq(module_id));
    }
    let absences = finder.all(db.get_ref()).await?;

    let students: HashMap<i32, String> = student_profile::Entity::find()
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|s| (s.id, format!("{} {}", s.first_name, s.last_name)))
        .collect();
    let modules: HashMap<i32, String> = module::Entity::find()
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let list: Vec<StudentAbsenceDto> = absences
        .into_iter()
        .map(|a| StudentAbsenceDto {
            id: a.id,
            student_id: a.student_id,
            student_name: students.get(&a.student_id).cloned(),
            module_id: a.module_id,
            module_name: modules.get(&a.module_id).cloned(),
            date: a.date.to_string(),
            hours: a.hours,
            reason: a.reason,
            is_justified: a.is_justified,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn toggle_student_absence_justified(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let absence = student_absence::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Absence non trouvée.", "absence"))?;

    let is_justified = !absence.is_justified;
    let active = student_absence::ActiveModel {
        id: Set(absence.id),
        is_justified: Set(is_justified),
        ..Default::default()
    };
    student_absence::Entity::update(active).exec(db.get_ref()).await?;

    let message = if is_justified { "Absence justifiée." } else { "Absence non justifiée." };
    Ok(HttpResponse::Ok()
        .json(ApiResponse::with_message(ToggleJustifiedResponse { is_justified }, message)))
}

async fn delete_student_absence(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let absence = student_absence::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Absence non trouvée.", "absence"))?;
    absence.delete(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Absence supprimée.")))
}

/// Professor absences are evaluated against the global threshold but never
/// trigger mail; the status only travels back in the response.
async fn create_professor_absence(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateProfessorAbsenceRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let professor_id = payload
        .professor_id
        .ok_or_else(|| AppError::validation_field("professorId requis.", "professorId"))?;
    let date = payload
        .date
        .ok_or_else(|| AppError::validation_field("date requise.", "date"))?;
    let hours = payload
        .hours
        .ok_or_else(|| AppError::validation_field("hours requis.", "hours"))?;
    validate::absence_hours(hours)?;
    validate::absence_date(date)?;

    let professor = professor_profile::Entity::find_by_id(professor_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Professeur non trouvé.", "professor"))?;

    let inserted = absence::record_professor_absence(
        db.get_ref(),
        NewProfessorAbsence {
            professor_id: professor.id,
            date,
            hours,
            reason: payload.reason.clone(),
            is_justified: payload.is_justified.unwrap_or(false),
            recorded_by_id: Some(auth.user_id),
        },
    )
    .await?;

    let total_hours = absence::professor_absence_hours(db.get_ref(), professor.id, false).await?;
    let setting = global_setting(db.get_ref()).await?;
    let (threshold_hours, warning_percentage) = match &setting {
        Some(s) => (s.total_hours(), s.warning_percentage),
        None => (0.0, 50.0),
    };
    let status = absence::classify(total_hours, threshold_hours, warning_percentage);

    let response = CreateProfessorAbsenceResponse {
        id: inserted.id,
        total_hours,
        total_days: absence::hours_to_days(total_hours),
        threshold_status: status,
    };
    Ok(HttpResponse::Created().json(ApiResponse::with_message(response, "Absence enregistrée.")))
}

async fn list_professor_absences(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<ListProfessorAbsencesQuery>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let mut finder =
        professor_absence::Entity::find().order_by_desc(professor_absence::Column::Date);
    if let Some(professor_id) = query.professor_id {
        finder = finder.filter(professor_absence::Column::ProfessorId.eq(professor_id));
    }
    let absences = finder.all(db.get_ref()).await?;

    let professors: HashMap<i32, String> = professor_profile::Entity::find()
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|p| (p.id, format!("{} {}", p.first_name, p.last_name)))
        .collect();

    let list: Vec<ProfessorAbsenceDto> = absences
        .into_iter()
        .map(|a| ProfessorAbsenceDto {
            id: a.id,
            professor_id: a.professor_id,
            professor_name: professors.get(&a.professor_id).cloned(),
            date: a.date.to_string(),
            hours: a.hours,
            reason: a.reason,
            is_justified: a.is_justified,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn delete_professor_absence(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let absence = professor_absence::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Absence non trouvée.", "absence"))?;
    absence.delete(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Absence supprimée.")))
}
