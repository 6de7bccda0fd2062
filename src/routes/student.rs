use std::collections::{HashMap, HashSet};

use actix_web::{web, HttpResponse};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::absence::{self, ThresholdStatus};
use crate::auth::{require_role, AuthUser};
use crate::config::AppConfig;
use crate::entity::user::{self, Role};
use crate::entity::{classe, major, major_module, module, professor_profile, student_absence,
                    student_profile, teaching_assignment};
use crate::error::AppError;
use crate::response::ApiResponse;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::get().to(list_students)))
        .service(web::resource("/{id}").route(web::get().to(get_student)))
        .service(web::resource("/{id}/absences").route(web::get().to(student_absences)))
        .service(web::resource("/{id}/modules").route(web::get().to(student_module_stats)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStudentsQuery {
    class_id: Option<i32>,
    major_id: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbsencesQuery {
    module_id: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentDto {
    id: i32,
    student_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    class_id: Option<i32>,
    class_name: Option<String>,
    major_id: Option<i32>,
    major_name: Option<String>,
    current_semester: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentDetailDto {
    id: i32,
    student_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    date_of_birth: Option<String>,
    place_of_birth: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    class_id: Option<i32>,
    class_name: Option<String>,
    major_id: Option<i32>,
    major_name: Option<String>,
    current_semester: i32,
    enrollment_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AbsenceDto {
    id: i32,
    module_id: i32,
    module_name: Option<String>,
    date: String,
    hours: f64,
    reason: Option<String>,
    is_justified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AbsenceListDto {
    absences: Vec<AbsenceDto>,
    total_hours: f64,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleStatDto {
    module_id: i32,
    code: String,
    name: String,
    absence_threshold: f64,
    hours: f64,
    rate: f64,
    status: ThresholdStatus,
}

/// Classes a professor teaches, resolved from their assignments. Empty when
/// the user has no professor profile.
pub(crate) async fn taught_class_ids(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<i32>, AppError> {
    let professor = professor_profile::Entity::find()
        .filter(professor_profile::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    let professor = match professor {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };
    let assignments = teaching_assignment::Entity::find()
        .filter(teaching_assignment::Column::ProfessorId.eq(professor.id))
        .all(db)
        .await?;
    Ok(assignments.into_iter().filter_map(|a| a.class_id).collect())
}

async fn can_view_student(
    db: &DatabaseConnection,
    auth: &AuthUser,
    student: &student_profile::Model,
) -> Result<(), AppError> {
    if auth.role.is_admin() {
        return Ok(());
    }
    match auth.role {
        Role::Student => {
            if student.user_id == auth.user_id {
                Ok(())
            } else {
                Err(AppError::forbidden())
            }
        }
        Role::Professor => {
            let class_ids = taught_class_ids(db, auth.user_id).await?;
            match student.class_id {
                Some(class_id) if class_ids.contains(&class_id) => Ok(()),
                _ => Err(AppError::forbidden()),
            }
        }
        _ => Err(AppError::forbidden()),
    }
}

async fn find_student(
    db: &DatabaseConnection,
    id: i32,
) -> Result<student_profile::Model, AppError> {
    student_profile::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Étudiant non trouvé.", "student"))
}

async fn class_names(
    db: &DatabaseConnection,
) -> Result<HashMap<i32, String>, AppError> {
    let classes = classe::Entity::find().all(db).await?;
    Ok(classes.into_iter().map(|c| (c.id, c.name)).collect())
}

async fn major_names(
    db: &DatabaseConnection,
) -> Result<HashMap<i32, String>, AppError> {
    let majors = major::Entity::find().all(db).await?;
    Ok(majors.into_iter().map(|m| (m.id, m.name)).collect())
}

async fn list_students(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<ListStudentsQuery>,
) -> Result<HttpResponse, AppError> {
    require_role(&auth, &[Role::SuperAdmin, Role::AdminStaff, Role::Professor])?;

    let mut finder = student_profile::Entity::find().order_by_asc(student_profile::Column::LastName);

    // Professors only see students of the classes they teach.
    if auth.role == Role::Professor {
        let class_ids = taught_class_ids(db.get_ref(), auth.user_id).await?;
        finder = finder.filter(student_profile::Column::ClassId.is_in(class_ids));
    }
    if let Some(class_id) = query.class_id {
        finder = finder.filter(student_profile::Column::ClassId.eq(class_id));
    }
    if let Some(major_id) = query.major_id {
        finder = finder.filter(student_profile::Column::MajorId.eq(major_id));
    }

    let students = finder.all(db.get_ref()).await?;
    let classes = class_names(db.get_ref()).await?;
    let majors = major_names(db.get_ref()).await?;
    let users: HashMap<i32, String> = user::Entity::find()
        .filter(user::Column::Role.eq(Role::Student))
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|u| (u.id, u.email))
        .collect();

    let list: Vec<StudentDto> = students
        .into_iter()
        .map(|s| StudentDto {
            id: s.id,
            student_id: s.student_id,
            first_name: s.first_name,
            last_name: s.last_name,
            email: users.get(&s.user_id).cloned(),
            class_id: s.class_id,
            class_name: s.class_id.and_then(|id| classes.get(&id).cloned()),
            major_id: s.major_id,
            major_name: s.major_id.and_then(|id| majors.get(&id).cloned()),
            current_semester: s.current_semester,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_student(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let student = find_student(db.get_ref(), *path).await?;
    can_view_student(db.get_ref(), &auth, &student).await?;

    let email = user::Entity::find_by_id(student.user_id)
        .one(db.get_ref())
        .await?
        .map(|u| u.email);
    let classes = class_names(db.get_ref()).await?;
    let majors = major_names(db.get_ref()).await?;

    let dto = StudentDetailDto {
        id: student.id,
        student_id: student.student_id,
        first_name: student.first_name,
        last_name: student.last_name,
        email,
        date_of_birth: student.date_of_birth.map(|d| d.to_string()),
        place_of_birth: student.place_of_birth,
        phone: student.phone,
        address: student.address,
        class_id: student.class_id,
        class_name: student.class_id.and_then(|id| classes.get(&id).cloned()),
        major_id: student.major_id,
        major_name: student.major_id.and_then(|id| majors.get(&id).cloned()),
        current_semester: student.current_semester,
        enrollment_date: student.enrollment_date.map(|d| d.to_string()),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn student_absences(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
    query: web::Query<AbsencesQuery>,
) -> Result<HttpResponse, AppError> {
    let student = find_student(db.get_ref(), *path).await?;
    can_view_student(db.get_ref(), &auth, &student).await?;

    let mut finder = student_absence::Entity::find()
        .filter(student_absence::Column::StudentId.eq(student.id))
        .order_by_desc(student_absence::Column::Date);
    if let Some(module_id) = query.module_id {
        finder = finder.filter(student_absence::Column::ModuleId.eq(module_id));
    }
    let absences = finder.all(db.get_ref()).await?;

    let modules: HashMap<i32, String> = module::Entity::find()
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let total_hours: f64 = absences.iter().map(|a| a.hours).sum();
    let count = absences.len();
    let list: Vec<AbsenceDto> = absences
        .into_iter()
        .map(|a| AbsenceDto {
            id: a.id,
            module_id: a.module_id,
            module_name: modules.get(&a.module_id).cloned(),
            date: a.date.to_string(),
            hours: a.hours,
            reason: a.reason,
            is_justified: a.is_justified,
        })
        .collect();

    let dto = AbsenceListDto { absences: list, total_hours, count };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

/// Per-module absence standing for a student: the curriculum modules of their
/// current semester plus any module they already have absences in, sorted by
/// consumed rate.
async fn student_module_stats(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let student = find_student(db.get_ref(), *path).await?;
    can_view_student(db.get_ref(), &auth, &student).await?;

    let mut module_ids: HashSet<i32> = student_absence::Entity::find()
        .filter(student_absence::Column::StudentId.eq(student.id))
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|a| a.module_id)
        .collect();

    if let Some(major_id) = student.major_id {
        let links = major_module::Entity::find()
            .filter(major_module::Column::MajorId.eq(major_id))
            .filter(major_module::Column::Semester.eq(student.current_semester))
            .all(db.get_ref())
            .await?;
        module_ids.extend(links.into_iter().map(|l| l.module_id));
    }

    let mut stats = Vec::with_capacity(module_ids.len());
    for module_id in module_ids {
        let module = match module::Entity::find_by_id(module_id).one(db.get_ref()).await? {
            Some(m) => m,
            None => continue,
        };
        let hours =
            absence::student_absence_hours(db.get_ref(), student.id, Some(module.id), false).await?;
        let rate = absence::absence_rate(hours, module.absence_threshold);
        let status = absence::classify(hours, module.absence_threshold, config.warning_percentage);
        stats.push(ModuleStatDto {
            module_id: module.id,
            code: module.code,
            name: module.name,
            absence_threshold: module.absence_threshold,
            hours,
            rate,
            status,
        });
    }
    stats.sort_by(|a, b| b.rate.partial_cmp(&a.rate).unwrap_or(std::cmp::Ordering::Equal));

    Ok(HttpResponse::Ok().json(ApiResponse::data(stats)))
}
