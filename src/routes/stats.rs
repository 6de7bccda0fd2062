use actix_web::{web, HttpResponse};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;

use crate::auth::{require_admin, AuthUser};
use crate::entity::user::Role;
use crate::error::AppError;
use crate::response::ApiResponse;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/dashboard").route(web::get().to(dashboard)));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserStatsDto {
    total: i64,
    students: i64,
    professors: i64,
    staff: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcademicStatsDto {
    classes: i64,
    modules: i64,
    majors: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AbsenceStatsDto {
    student_total: i64,
    professor_total: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardDto {
    users: UserStatsDto,
    academic: AcademicStatsDto,
    absences: AbsenceStatsDto,
}

async fn dashboard(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;
    let db = db.get_ref();

    let dto = DashboardDto {
        users: UserStatsDto {
            total: count_by_sql(db, "SELECT COUNT(*) as cnt FROM t_user", vec![]).await?,
            students: count_users_by_role(db, Role::Student).await?,
            professors: count_users_by_role(db, Role::Professor).await?,
            staff: count_users_by_role(db, Role::AdminStaff).await?,
        },
        academic: AcademicStatsDto {
            classes: count_active(db, "t_classe").await?,
            modules: count_active(db, "t_module").await?,
            majors: count_active(db, "t_major").await?,
        },
        absences: AbsenceStatsDto {
            student_total: count_by_sql(db, "SELECT COUNT(*) as cnt FROM t_student_absence", vec![])
                .await?,
            professor_total:
                count_by_sql(db, "SELECT COUNT(*) as cnt FROM t_professor_absence", vec![]).await?,
        },
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn count_users_by_role(db: &DatabaseConnection, role: Role) -> Result<i64, AppError> {
    count_by_sql(
        db,
        "SELECT COUNT(*) as cnt FROM t_user WHERE role = ?",
        vec![sea_orm::Value::String(Some(Box::new(role.as_str().to_string())))],
    )
    .await
}

async fn count_active(db: &DatabaseConnection, table: &str) -> Result<i64, AppError> {
    let sql = format!("SELECT COUNT(*) as cnt FROM {} WHERE is_active = ?", table);
    count_by_sql(db, &sql, vec![sea_orm::Value::Bool(Some(true))]).await
}

async fn count_by_sql(
    db: &DatabaseConnection,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<i64, AppError> {
    let backend = db.get_database_backend();
    let stmt = sea_orm::Statement::from_sql_and_values(backend, sql, values);
    let row = db.query_one(stmt).await?;
    let cnt = row.and_then(|r| r.try_get::<i64>("", "cnt").ok()).unwrap_or(0);
    Ok(cnt)
}
