use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
              QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::entity::{classe, module, professor_profile, teaching_assignment};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create_assignment))
            .route(web::get().to(list_assignments)),
    )
    .service(web::resource("/{id}").route(web::delete().to(delete_assignment)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssignmentRequest {
    professor_id: Option<i32>,
    module_id: Option<i32>,
    class_id: Option<i32>,
    academic_year: Option<String>,
    semester: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAssignmentsQuery {
    professor_id: Option<i32>,
    module_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentDto {
    id: i32,
    professor_id: i32,
    professor_name: Option<String>,
    module_id: i32,
    module_name: Option<String>,
    class_id: Option<i32>,
    class_name: Option<String>,
    academic_year: Option<String>,
    semester: Option<i32>,
}

async fn create_assignment(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateAssignmentRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let professor_id = payload
        .professor_id
        .ok_or_else(|| AppError::validation_field("professorId requis.", "professorId"))?;
    let module_id = payload
        .module_id
        .ok_or_else(|| AppError::validation_field("moduleId requis.", "moduleId"))?;

    professor_profile::Entity::find_by_id(professor_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Professeur non trouvé.", "professor"))?;
    module::Entity::find_by_id(module_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Module non trouvé.", "module"))?;
    if let Some(class_id) = payload.class_id {
        classe::Entity::find_by_id(class_id)
            .one(db.get_ref())
            .await?
            .ok_or_else(|| AppError::not_found("Classe non trouvée.", "class"))?;
    }
    if let Some(year) = &payload.academic_year {
        validate::academic_year(year)?;
    }
    if let Some(semester) = payload.semester {
        validate::semester(semester)?;
    }

    // Unique per (professor, module, class, academic year).
    let mut dup = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ProfessorId.eq(professor_id))
        .filter(teaching_assignment::Column::ModuleId.eq(module_id));
    dup = match payload.class_id {
        Some(class_id) => dup.filter(teaching_assignment::Column::ClassId.eq(class_id)),
        None => dup.filter(teaching_assignment::Column::ClassId.is_null()),
    };
    dup = match payload.academic_year.clone() {
        Some(year) => dup.filter(teaching_assignment::Column::AcademicYear.eq(year)),
        None => dup.filter(teaching_assignment::Column::AcademicYear.is_null()),
    };
    if dup.one(db.get_ref()).await?.is_some() {
        return Err(AppError::duplicate("Cette affectation existe déjà."));
    }

    let inserted = teaching_assignment::ActiveModel {
        professor_id: Set(professor_id),
        module_id: Set(module_id),
        class_id: Set(payload.class_id),
        academic_year: Set(payload.academic_year.clone()),
        semester: Set(payload.semester),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    let dto = to_dto(db.get_ref(), inserted).await?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message(dto, "Affectation créée avec succès.")))
}

async fn to_dto(
    db: &DatabaseConnection,
    a: teaching_assignment::Model,
) -> Result<AssignmentDto, AppError> {
    let professor_name = professor_profile::Entity::find_by_id(a.professor_id)
        .one(db)
        .await?
        .map(|p| format!("{} {}", p.first_name, p.last_name));
    let module_name = module::Entity::find_by_id(a.module_id)
        .one(db)
        .await?
        .map(|m| m.name);
    let class_name = match a.class_id {
        Some(id) => classe::Entity::find_by_id(id).one(db).await?.map(|c| c.name),
        None => None,
    };
    Ok(AssignmentDto {
        id: a.id,
        professor_id: a.professor_id,
        professor_name,
        module_id: a.module_id,
        module_name,
        class_id: a.class_id,
        class_name,
        academic_year: a.academic_year,
        semester: a.semester,
    })
}

async fn list_assignments(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<ListAssignmentsQuery>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let mut finder = teaching_assignment::Entity::find()
        .order_by_desc(teaching_assignment::Column::CreatedAt);
    if let Some(professor_id) = query.professor_id {
        finder = finder.filter(teaching_assignment::Column::ProfessorId.eq(professor_id));
    }
    if let Some(module_id) = query.module_id {
        finder = finder.filter(teaching_assignment::Column::ModuleId.eq(module_id));
    }
    let assignments = finder.all(db.get_ref()).await?;

    let mut list = Vec::with_capacity(assignments.len());
    for a in assignments {
        list.push(to_dto(db.get_ref(), a).await?);
    }
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn delete_assignment(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let assignment = teaching_assignment::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Affectation non trouvée.", "assignment"))?;
    assignment.delete(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Affectation supprimée.")))
}
