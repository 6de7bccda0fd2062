use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
              QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::entity::{major, major_module, module, professor_profile, teaching_assignment};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create_module))
            .route(web::get().to(list_modules)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_module))
            .route(web::put().to(update_module)),
    )
    .service(web::resource("/{id}/majors").route(web::post().to(attach_major)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateModuleRequest {
    code: Option<String>,
    name: Option<String>,
    description: Option<String>,
    total_hours: Option<f64>,
    absence_threshold_hours: Option<i32>,
    absence_threshold_minutes: Option<i32>,
    credits: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateModuleRequest {
    name: Option<String>,
    description: Option<String>,
    total_hours: Option<f64>,
    absence_threshold_hours: Option<i32>,
    absence_threshold_minutes: Option<i32>,
    credits: Option<i32>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachMajorRequest {
    major_id: Option<i32>,
    semester: Option<i32>,
    is_required: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleDto {
    id: i32,
    code: String,
    name: String,
    description: Option<String>,
    total_hours: f64,
    absence_threshold: f64,
    credits: i32,
    is_active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleProfessorDto {
    id: i32,
    employee_id: String,
    first_name: String,
    last_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleMajorDto {
    major_id: i32,
    code: String,
    name: String,
    semester: i32,
    is_required: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleDetailDto {
    #[serde(flatten)]
    module: ModuleDto,
    professors: Vec<ModuleProfessorDto>,
    majors: Vec<ModuleMajorDto>,
}

/// The threshold is entered as whole hours plus minutes and stored as
/// fractional hours.
fn threshold_from_parts(hours: i32, minutes: i32) -> f64 {
    hours as f64 + minutes as f64 / 60.0
}

fn to_dto(m: module::Model) -> ModuleDto {
    ModuleDto {
        id: m.id,
        code: m.code,
        name: m.name,
        description: m.description,
        total_hours: m.total_hours,
        absence_threshold: m.absence_threshold,
        credits: m.credits,
        is_active: m.is_active,
    }
}

async fn create_module(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateModuleRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let code = payload.code.clone().unwrap_or_default();
    let name = payload.name.clone().unwrap_or_default();
    validate::required(&code, "code")?;
    validate::required(&name, "name")?;

    let total_hours = payload.total_hours.unwrap_or(42.0);
    validate::module_hours(total_hours)?;
    let threshold_hours = payload.absence_threshold_hours.unwrap_or(10);
    let threshold_minutes = payload.absence_threshold_minutes.unwrap_or(0);
    if threshold_hours < 0 {
        return Err(AppError::validation_field(
            "Les heures doivent être >= 0.",
            "absenceThresholdHours",
        ));
    }
    validate::threshold_minutes(threshold_minutes)?;
    let credits = payload.credits.unwrap_or(3);
    validate::credits(credits)?;

    let existing = module::Entity::find()
        .filter(module::Column::Code.eq(code.clone()))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate_field("Ce code de module existe déjà.", "code"));
    }

    let inserted = module::ActiveModel {
        code: Set(code),
        name: Set(name),
        description: Set(payload.description.clone()),
        total_hours: Set(total_hours),
        absence_threshold: Set(threshold_from_parts(threshold_hours, threshold_minutes)),
        credits: Set(credits),
        is_active: Set(true),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    Ok(HttpResponse::Created()
        .json(ApiResponse::with_message(to_dto(inserted), "Module créé avec succès.")))
}

async fn list_modules(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let modules = module::Entity::find()
        .filter(module::Column::IsActive.eq(true))
        .order_by_asc(module::Column::Name)
        .all(db.get_ref())
        .await?;
    let list: Vec<ModuleDto> = modules.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_module(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let module = module::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Module non trouvé.", "module"))?;

    let assignments = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ModuleId.eq(module.id))
        .all(db.get_ref())
        .await?;
    let mut professors = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for a in assignments {
        if !seen.insert(a.professor_id) {
            continue;
        }
        if let Some(p) = professor_profile::Entity::find_by_id(a.professor_id)
            .one(db.get_ref())
            .await?
        {
            professors.push(ModuleProfessorDto {
                id: p.id,
                employee_id: p.employee_id,
                first_name: p.first_name,
                last_name: p.last_name,
            });
        }
    }

    let links = major_module::Entity::find()
        .filter(major_module::Column::ModuleId.eq(module.id))
        .all(db.get_ref())
        .await?;
    let mut majors = Vec::with_capacity(links.len());
    for link in links {
        if let Some(m) = major::Entity::find_by_id(link.major_id).one(db.get_ref()).await? {
            majors.push(ModuleMajorDto {
                major_id: m.id,
                code: m.code,
                name: m.name,
                semester: link.semester,
                is_required: link.is_required,
            });
        }
    }

    let dto = ModuleDetailDto { module: to_dto(module), professors, majors };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn update_module(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateModuleRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let module = module::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Module non trouvé.", "module"))?;

    let mut active = module::ActiveModel {
        id: Set(module.id),
        ..Default::default()
    };
    if let Some(name) = payload.name.clone() {
        validate::required(&name, "name")?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description.clone() {
        active.description = Set(Some(description));
    }
    if let Some(total_hours) = payload.total_hours {
        validate::module_hours(total_hours)?;
        active.total_hours = Set(total_hours);
    }
    if payload.absence_threshold_hours.is_some() || payload.absence_threshold_minutes.is_some() {
        let hours = payload.absence_threshold_hours.unwrap_or(0);
        let minutes = payload.absence_threshold_minutes.unwrap_or(0);
        if hours < 0 {
            return Err(AppError::validation_field(
                "Les heures doivent être >= 0.",
                "absenceThresholdHours",
            ));
        }
        validate::threshold_minutes(minutes)?;
        active.absence_threshold = Set(threshold_from_parts(hours, minutes));
    }
    if let Some(credits) = payload.credits {
        validate::credits(credits)?;
        active.credits = Set(credits);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let updated = module::Entity::update(active).exec(db.get_ref()).await?;

    Ok(HttpResponse::Ok()
        .json(ApiResponse::with_message(to_dto(updated), "Module mis à jour avec succès.")))
}

async fn attach_major(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<AttachMajorRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let module = module::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Module non trouvé.", "module"))?;
    let major_id = payload
        .major_id
        .ok_or_else(|| AppError::validation_field("majorId requis.", "majorId"))?;
    major::Entity::find_by_id(major_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Filière non trouvée.", "major"))?;
    let semester = payload
        .semester
        .ok_or_else(|| AppError::validation_field("semester requis.", "semester"))?;
    validate::semester(semester)?;

    let existing = major_module::Entity::find()
        .filter(major_module::Column::MajorId.eq(major_id))
        .filter(major_module::Column::ModuleId.eq(module.id))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate("Ce module est déjà associé à cette filière."));
    }

    major_module::ActiveModel {
        major_id: Set(major_id),
        module_id: Set(module.id),
        semester: Set(semester),
        is_required: Set(payload.is_required.unwrap_or(true)),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::message("Module associé à la filière.")))
}
