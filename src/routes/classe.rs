use std::collections::HashSet;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
              QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::entity::{classe, major, professor_profile, student_profile, teaching_assignment};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create_class))
            .route(web::get().to(list_classes)),
    )
    .service(
        web::resource("/{id}")
            .route(web::get().to(get_class))
            .route(web::put().to(update_class)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClassRequest {
    code: Option<String>,
    name: Option<String>,
    academic_year: Option<String>,
    semester: Option<i32>,
    max_students: Option<i32>,
    major_id: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateClassRequest {
    name: Option<String>,
    academic_year: Option<String>,
    semester: Option<i32>,
    max_students: Option<i32>,
    major_id: Option<i32>,
    is_active: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassDto {
    id: i32,
    code: String,
    name: String,
    academic_year: Option<String>,
    semester: i32,
    max_students: i32,
    is_active: bool,
    major_id: Option<i32>,
    student_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassProfessorDto {
    id: i32,
    employee_id: String,
    first_name: String,
    last_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassDetailDto {
    #[serde(flatten)]
    class: ClassDto,
    major_name: Option<String>,
    professors: Vec<ClassProfessorDto>,
}

async fn student_count(db: &DatabaseConnection, class_id: i32) -> Result<u64, AppError> {
    let count = student_profile::Entity::find()
        .filter(student_profile::Column::ClassId.eq(class_id))
        .count(db)
        .await?;
    Ok(count)
}

async fn create_class(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateClassRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let code = payload.code.clone().unwrap_or_default();
    let name = payload.name.clone().unwrap_or_default();
    validate::required(&code, "code")?;
    validate::required(&name, "name")?;
    if let Some(year) = &payload.academic_year {
        validate::academic_year(year)?;
    }
    let semester = payload.semester.unwrap_or(1);
    validate::semester(semester)?;
    let max_students = payload.max_students.unwrap_or(30);
    validate::max_students(max_students)?;
    if let Some(major_id) = payload.major_id {
        major::Entity::find_by_id(major_id)
            .one(db.get_ref())
            .await?
            .ok_or_else(|| AppError::not_found("Filière non trouvée.", "major"))?;
    }

    let existing = classe::Entity::find()
        .filter(classe::Column::Code.eq(code.clone()))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate_field("Ce code de classe existe déjà.", "code"));
    }

    let inserted = classe::ActiveModel {
        code: Set(code),
        name: Set(name),
        academic_year: Set(payload.academic_year.clone()),
        semester: Set(semester),
        max_students: Set(max_students),
        is_active: Set(true),
        created_at: Set(Some(Utc::now())),
        major_id: Set(payload.major_id),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    let dto = ClassDto {
        id: inserted.id,
        code: inserted.code,
        name: inserted.name,
        academic_year: inserted.academic_year,
        semester: inserted.semester,
        max_students: inserted.max_students,
        is_active: inserted.is_active,
        major_id: inserted.major_id,
        student_count: 0,
    };
    Ok(HttpResponse::Created().json(ApiResponse::with_message(dto, "Classe créée avec succès.")))
}

async fn list_classes(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let classes = classe::Entity::find()
        .filter(classe::Column::IsActive.eq(true))
        .order_by_asc(classe::Column::Code)
        .all(db.get_ref())
        .await?;

    let mut list = Vec::with_capacity(classes.len());
    for c in classes {
        let count = student_count(db.get_ref(), c.id).await?;
        list.push(ClassDto {
            id: c.id,
            code: c.code,
            name: c.name,
            academic_year: c.academic_year,
            semester: c.semester,
            max_students: c.max_students,
            is_active: c.is_active,
            major_id: c.major_id,
            student_count: count,
        });
    }
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_class(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let class = classe::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Classe non trouvée.", "class"))?;

    let count = student_count(db.get_ref(), class.id).await?;
    let major_name = match class.major_id {
        Some(id) => major::Entity::find_by_id(id)
            .one(db.get_ref())
            .await?
            .map(|m| m.name),
        None => None,
    };

    let assignments = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ClassId.eq(class.id))
        .all(db.get_ref())
        .await?;
    let professor_ids: HashSet<i32> = assignments.into_iter().map(|a| a.professor_id).collect();
    let professors = professor_profile::Entity::find()
        .filter(professor_profile::Column::Id.is_in(professor_ids))
        .order_by_asc(professor_profile::Column::LastName)
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|p| ClassProfessorDto {
            id: p.id,
            employee_id: p.employee_id,
            first_name: p.first_name,
            last_name: p.last_name,
        })
        .collect();

    let dto = ClassDetailDto {
        class: ClassDto {
            id: class.id,
            code: class.code,
            name: class.name,
            academic_year: class.academic_year,
            semester: class.semester,
            max_students: class.max_students,
            is_active: class.is_active,
            major_id: class.major_id,
            student_count: count,
        },
        major_name,
        professors,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn update_class(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    payload: web::Json<UpdateClassRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let class = classe::Entity::find_by_id(*path)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Classe non trouvée.", "class"))?;

    let mut active = classe::ActiveModel {
        id: Set(class.id),
        ..Default::default()
    };
    if let Some(name) = payload.name.clone() {
        validate::required(&name, "name")?;
        active.name = Set(name);
    }
    if let Some(year) = payload.academic_year.clone() {
        validate::academic_year(&year)?;
        active.academic_year = Set(Some(year));
    }
    if let Some(semester) = payload.semester {
        validate::semester(semester)?;
        active.semester = Set(semester);
    }
    if let Some(max_students) = payload.max_students {
        validate::max_students(max_students)?;
        active.max_students = Set(max_students);
    }
    if let Some(major_id) = payload.major_id {
        major::Entity::find_by_id(major_id)
            .one(db.get_ref())
            .await?
            .ok_or_else(|| AppError::not_found("Filière non trouvée.", "major"))?;
        active.major_id = Set(Some(major_id));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let updated = classe::Entity::update(active).exec(db.get_ref()).await?;

    let count = student_count(db.get_ref(), updated.id).await?;
    let dto = ClassDto {
        id: updated.id,
        code: updated.code,
        name: updated.name,
        academic_year: updated.academic_year,
        semester: updated.semester,
        max_students: updated.max_students,
        is_active: updated.is_active,
        major_id: updated.major_id,
        student_count: count,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(dto, "Classe mise à jour avec succès.")))
}
