use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::absence::{self, ThresholdStatus};
use crate::auth::{require_admin, AuthUser};
use crate::entity::{classe, module, professor_absence, professor_profile, teaching_assignment};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::routes::threshold::global_setting;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(list_professors)))
        .service(web::resource("/{id}").route(web::get().to(get_professor)))
        .service(web::resource("/{id}/absences").route(web::get().to(professor_absences)))
        .service(web::resource("/{id}/modules").route(web::get().to(professor_modules)))
        .service(web::resource("/{id}/classes").route(web::get().to(professor_classes)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfessorDto {
    id: i32,
    employee_id: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    office: Option<String>,
    department: Option<String>,
    specialization: Option<String>,
    hire_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfessorAbsenceDto {
    id: i32,
    date: String,
    hours: f64,
    reason: Option<String>,
    is_justified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfessorAbsenceListDto {
    absences: Vec<ProfessorAbsenceDto>,
    total_hours: f64,
    total_days: f64,
    threshold_hours: f64,
    status: ThresholdStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaughtModuleDto {
    id: i32,
    code: String,
    name: String,
    total_hours: f64,
    credits: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaughtClassDto {
    id: i32,
    code: String,
    name: String,
    academic_year: Option<String>,
    semester: i32,
}

async fn find_professor(
    db: &DatabaseConnection,
    id: i32,
) -> Result<professor_profile::Model, AppError> {
    professor_profile::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Professeur non trouvé.", "professor"))
}

fn can_view_professor(auth: &AuthUser, professor: &professor_profile::Model) -> Result<(), AppError> {
    if auth.role.is_admin() || professor.user_id == auth.user_id {
        return Ok(());
    }
    Err(AppError::forbidden())
}

fn to_dto(p: professor_profile::Model) -> ProfessorDto {
    ProfessorDto {
        id: p.id,
        employee_id: p.employee_id,
        first_name: p.first_name,
        last_name: p.last_name,
        phone: p.phone,
        office: p.office,
        department: p.department,
        specialization: p.specialization,
        hire_date: p.hire_date.map(|d| d.to_string()),
    }
}

async fn list_professors(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;
    let professors = professor_profile::Entity::find()
        .order_by_asc(professor_profile::Column::LastName)
        .all(db.get_ref())
        .await?;
    let list: Vec<ProfessorDto> = professors.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_professor(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let professor = find_professor(db.get_ref(), *path).await?;
    can_view_professor(&auth, &professor)?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(to_dto(professor))))
}

async fn professor_absences(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let professor = find_professor(db.get_ref(), *path).await?;
    can_view_professor(&auth, &professor)?;

    let absences = professor_absence::Entity::find()
        .filter(professor_absence::Column::ProfessorId.eq(professor.id))
        .order_by_desc(professor_absence::Column::Date)
        .all(db.get_ref())
        .await?;

    let total_hours = absence::professor_absence_hours(db.get_ref(), professor.id, false).await?;
    let setting = global_setting(db.get_ref()).await?;
    let (threshold_hours, warning_percentage) = match &setting {
        Some(s) => (s.total_hours(), s.warning_percentage),
        None => (0.0, 50.0),
    };
    let status = absence::classify(total_hours, threshold_hours, warning_percentage);

    let dto = ProfessorAbsenceListDto {
        absences: absences
            .into_iter()
            .map(|a| ProfessorAbsenceDto {
                id: a.id,
                date: a.date.to_string(),
                hours: a.hours,
                reason: a.reason,
                is_justified: a.is_justified,
            })
            .collect(),
        total_hours,
        total_days: absence::hours_to_days(total_hours),
        threshold_hours,
        status,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn professor_modules(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let professor = find_professor(db.get_ref(), *path).await?;
    can_view_professor(&auth, &professor)?;

    let assignments = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ProfessorId.eq(professor.id))
        .all(db.get_ref())
        .await?;
    let module_ids: HashSet<i32> = assignments.into_iter().map(|a| a.module_id).collect();

    let modules = module::Entity::find()
        .filter(module::Column::Id.is_in(module_ids))
        .order_by_asc(module::Column::Name)
        .all(db.get_ref())
        .await?;
    let list: Vec<TaughtModuleDto> = modules
        .into_iter()
        .map(|m| TaughtModuleDto {
            id: m.id,
            code: m.code,
            name: m.name,
            total_hours: m.total_hours,
            credits: m.credits,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn professor_classes(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let professor = find_professor(db.get_ref(), *path).await?;
    can_view_professor(&auth, &professor)?;

    let assignments = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ProfessorId.eq(professor.id))
        .all(db.get_ref())
        .await?;
    let class_ids: HashSet<i32> = assignments.into_iter().filter_map(|a| a.class_id).collect();

    let classes = classe::Entity::find()
        .filter(classe::Column::Id.is_in(class_ids))
        .order_by_asc(classe::Column::Code)
        .all(db.get_ref())
        .await?;
    let list: Vec<TaughtClassDto> = classes
        .into_iter()
        .map(|c| TaughtClassDto {
            id: c.id,
            code: c.code,
            name: c.name,
            academic_year: c.academic_year,
            semester: c.semester,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}
