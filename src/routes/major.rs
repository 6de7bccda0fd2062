use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
              QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::entity::{major, major_module, module};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create_major))
            .route(web::get().to(list_majors)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_major))
            .route(web::put().to(update_major)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMajorRequest {
    code: Option<String>,
    name: Option<String>,
    description: Option<String>,
    total_semesters: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMajorRequest {
    name: Option<String>,
    description: Option<String>,
    total_semesters: Option<i32>,
    is_active: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MajorDto {
    id: i32,
    code: String,
    name: String,
    description: Option<String>,
    total_semesters: i32,
    is_active: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MajorModuleDto {
    module_id: i32,
    code: String,
    name: String,
    semester: i32,
    is_required: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MajorDetailDto {
    #[serde(flatten)]
    major: MajorDto,
    modules: Vec<MajorModuleDto>,
}

fn to_dto(m: major::Model) -> MajorDto {
    MajorDto {
        id: m.id,
        code: m.code,
        name: m.name,
        description: m.description,
        total_semesters: m.total_semesters,
        is_active: m.is_active,
    }
}

async fn create_major(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateMajorRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let code = payload.code.clone().unwrap_or_default();
    let name = payload.name.clone().unwrap_or_default();
    validate::required(&code, "code")?;
    validate::required(&name, "name")?;
    let total_semesters = payload.total_semesters.unwrap_or(6);
    validate::semester(total_semesters)?;

    let existing = major::Entity::find()
        .filter(major::Column::Code.eq(code.clone()))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate_field("Ce code de filière existe déjà.", "code"));
    }

    let inserted = major::ActiveModel {
        code: Set(code),
        name: Set(name),
        description: Set(payload.description.clone()),
        total_semesters: Set(total_semesters),
        is_active: Set(true),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    Ok(HttpResponse::Created()
        .json(ApiResponse::with_message(to_dto(inserted), "Filière créée avec succès.")))
}

async fn list_majors(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let majors = major::Entity::find()
        .order_by_asc(major::Column::Code)
        .all(db.get_ref())
        .await?;
    let list: Vec<MajorDto> = majors.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_major(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let major = major::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Filière non trouvée.", "major"))?;

    let links = major_module::Entity::find()
        .filter(major_module::Column::MajorId.eq(major.id))
        .order_by_asc(major_module::Column::Semester)
        .all(db.get_ref())
        .await?;

    let mut modules = Vec::with_capacity(links.len());
    for link in links {
        if let Some(m) = module::Entity::find_by_id(link.module_id).one(db.get_ref()).await? {
            modules.push(MajorModuleDto {
                module_id: m.id,
                code: m.code,
                name: m.name,
                semester: link.semester,
                is_required: link.is_required,
            });
        }
    }

    let dto = MajorDetailDto { major: to_dto(major), modules };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn update_major(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateMajorRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let major = major::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Filière non trouvée.", "major"))?;

    let mut active = major::ActiveModel {
        id: Set(major.id),
        ..Default::default()
    };
    if let Some(name) = payload.name.clone() {
        validate::required(&name, "name")?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description.clone() {
        active.description = Set(Some(description));
    }
    if let Some(total_semesters) = payload.total_semesters {
        validate::semester(total_semesters)?;
        active.total_semesters = Set(total_semesters);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let updated = major::Entity::update(active).exec(db.get_ref()).await?;

    Ok(HttpResponse::Ok()
        .json(ApiResponse::with_message(to_dto(updated), "Filière mise à jour avec succès.")))
}
