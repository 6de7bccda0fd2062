use actix_web::{web, HttpResponse};
use bcrypt::hash;
use chrono::{NaiveDate, Utc};
use log::error;
use rand::Rng;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
              QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, require_super_admin, AuthUser};
use crate::config::AppConfig;
use crate::entity::user::{self, Role};
use crate::entity::{professor_profile, staff_profile, student_profile};
use crate::error::AppError;
use crate::mailer::{welcome_mail, Mailer};
use crate::response::ApiResponse;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(create_user))
            .route(web::get().to(list_users)),
    )
    .service(web::resource("/{id}").route(web::get().to(get_user)))
    .service(web::resource("/{id}/toggle-status").route(web::post().to(toggle_user_status)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload {
    student_id: Option<String>,
    employee_id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    place_of_birth: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    office: Option<String>,
    department: Option<String>,
    specialization: Option<String>,
    position: Option<String>,
    hire_date: Option<NaiveDate>,
    major_id: Option<i32>,
    class_id: Option<i32>,
    current_semester: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    email: Option<String>,
    role: Option<Role>,
    profile: Option<ProfilePayload>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserResponse {
    user_id: i32,
    email: String,
    initial_password: String,
}

#[derive(Deserialize)]
struct ListUsersQuery {
    role: Option<Role>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: i32,
    email: String,
    role: Role,
    is_active: bool,
    full_name: String,
    created_at: Option<String>,
    last_login: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDto {
    first_name: String,
    last_name: String,
    phone: Option<String>,
    photo: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDetailDto {
    id: i32,
    email: String,
    role: Role,
    is_active: bool,
    is_first_login: bool,
    created_at: Option<String>,
    last_login: Option<String>,
    profile: Option<ProfileDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleStatusResponse {
    is_active: bool,
}

/// Resolves a user's display name from the profile matching their role,
/// falling back to the email address.
pub(crate) async fn full_name(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<String, AppError> {
    let name = match user.role {
        Role::Student => student_profile::Entity::find()
            .filter(student_profile::Column::UserId.eq(user.id))
            .one(db)
            .await?
            .map(|p| format!("{} {}", p.first_name, p.last_name)),
        Role::Professor => professor_profile::Entity::find()
            .filter(professor_profile::Column::UserId.eq(user.id))
            .one(db)
            .await?
            .map(|p| format!("{} {}", p.first_name, p.last_name)),
        Role::SuperAdmin | Role::AdminStaff => staff_profile::Entity::find()
            .filter(staff_profile::Column::UserId.eq(user.id))
            .one(db)
            .await?
            .map(|p| format!("{} {}", p.first_name, p.last_name)),
    };
    Ok(name.unwrap_or_else(|| user.email.clone()))
}

fn generate_initial_password() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

async fn create_user(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    mailer: web::Data<Mailer>,
    auth: AuthUser,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let email = payload.email.clone().unwrap_or_default().to_lowercase();
    validate::required(&email, "email")?;
    validate::email(&email)?;
    let role = payload
        .role
        .ok_or_else(|| AppError::validation_field("Rôle requis.", "role"))?;

    // Only the super admin may add administrative staff.
    if role == Role::AdminStaff && auth.role != Role::SuperAdmin {
        return Err(AppError::Authorization(
            "Seul un super admin peut créer du personnel administratif.".to_string(),
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(AppError::duplicate_field("Cet email est déjà utilisé.", "email"));
    }

    let profile = payload
        .profile
        .as_ref()
        .ok_or_else(|| AppError::validation_field("Profil requis.", "profile"))?;
    if let Some(semester) = profile.current_semester {
        validate::semester(semester)?;
    }

    let initial_password = generate_initial_password();
    let password_hash = hash(&initial_password, bcrypt::DEFAULT_COST)
        .map_err(|_| AppError::Database("Erreur de base de données.".to_string()))?;
    let now = Utc::now();

    let txn = db.get_ref().begin().await?;

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        role: Set(role),
        is_active: Set(true),
        is_first_login: Set(true),
        initial_password: Set(Some(initial_password.clone())),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        created_by_id: Set(Some(auth.user_id)),
        ..Default::default()
    };
    let new_user = new_user.insert(&txn).await?;

    let first_name = profile.first_name.clone().unwrap_or_default();
    let last_name = profile.last_name.clone().unwrap_or_default();

    match role {
        Role::Student => {
            let student_id = profile
                .student_id
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    AppError::validation_field("studentId requis pour les étudiants.", "studentId")
                })?;
            let dup = student_profile::Entity::find()
                .filter(student_profile::Column::StudentId.eq(student_id.clone()))
                .one(&txn)
                .await?;
            if dup.is_some() {
                return Err(AppError::duplicate_field(
                    "Ce numéro étudiant existe déjà.",
                    "studentId",
                ));
            }
            student_profile::ActiveModel {
                user_id: Set(new_user.id),
                student_id: Set(student_id),
                first_name: Set(first_name.clone()),
                last_name: Set(last_name.clone()),
                date_of_birth: Set(profile.date_of_birth),
                place_of_birth: Set(profile.place_of_birth.clone()),
                phone: Set(profile.phone.clone()),
                address: Set(profile.address.clone()),
                major_id: Set(profile.major_id),
                current_semester: Set(profile.current_semester.unwrap_or(1)),
                class_id: Set(profile.class_id),
                enrollment_date: Set(Some(now.date_naive())),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        Role::Professor => {
            let employee_id = required_employee_id(profile)?;
            let dup = professor_profile::Entity::find()
                .filter(professor_profile::Column::EmployeeId.eq(employee_id.clone()))
                .one(&txn)
                .await?;
            if dup.is_some() {
                return Err(AppError::duplicate_field("Ce matricule existe déjà.", "employeeId"));
            }
            professor_profile::ActiveModel {
                user_id: Set(new_user.id),
                employee_id: Set(employee_id),
                first_name: Set(first_name.clone()),
                last_name: Set(last_name.clone()),
                phone: Set(profile.phone.clone()),
                office: Set(profile.office.clone()),
                department: Set(profile.department.clone()),
                specialization: Set(profile.specialization.clone()),
                hire_date: Set(profile.hire_date),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        Role::AdminStaff | Role::SuperAdmin => {
            let employee_id = required_employee_id(profile)?;
            let dup = staff_profile::Entity::find()
                .filter(staff_profile::Column::EmployeeId.eq(employee_id.clone()))
                .one(&txn)
                .await?;
            if dup.is_some() {
                return Err(AppError::duplicate_field("Ce matricule existe déjà.", "employeeId"));
            }
            staff_profile::ActiveModel {
                user_id: Set(new_user.id),
                employee_id: Set(employee_id),
                first_name: Set(first_name.clone()),
                last_name: Set(last_name.clone()),
                phone: Set(profile.phone.clone()),
                office: Set(profile.office.clone()),
                department: Set(profile.department.clone()),
                position: Set(profile.position.clone()),
                hire_date: Set(profile.hire_date),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    let display_name = if first_name.trim().is_empty() && last_name.trim().is_empty() {
        email.clone()
    } else {
        format!("{} {}", first_name, last_name)
    };
    let mail = welcome_mail(&config.app_name, &display_name, &email, &initial_password);
    if let Err(e) = mailer.send(&email, &mail) {
        error!("failed to send welcome email: {}", e);
    }

    let response = CreateUserResponse {
        user_id: new_user.id,
        email: new_user.email,
        initial_password,
    };
    Ok(HttpResponse::Created()
        .json(ApiResponse::with_message(response, "Utilisateur créé avec succès.")))
}

fn required_employee_id(profile: &ProfilePayload) -> Result<String, AppError> {
    profile
        .employee_id
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation_field("employeeId requis.", "employeeId"))
}

async fn list_users(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let mut finder = user::Entity::find().order_by_desc(user::Column::CreatedAt);
    if let Some(role) = query.role {
        finder = finder.filter(user::Column::Role.eq(role));
    }
    let users = finder.all(db.get_ref()).await?;

    let mut list = Vec::with_capacity(users.len());
    for u in users {
        let name = full_name(db.get_ref(), &u).await?;
        list.push(UserDto {
            id: u.id,
            email: u.email,
            role: u.role,
            is_active: u.is_active,
            full_name: name,
            created_at: u.created_at.map(|d| d.to_rfc3339()),
            last_login: u.last_login.map(|d| d.to_rfc3339()),
        });
    }
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn get_user(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user_id = *path;
    // Users see themselves, admins see anyone.
    if auth.user_id != user_id {
        require_admin(&auth)?;
    }

    let user = user::Entity::find_by_id(user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Utilisateur non trouvé.", "user"))?;

    let profile = match user.role {
        Role::Student => student_profile::Entity::find()
            .filter(student_profile::Column::UserId.eq(user.id))
            .one(db.get_ref())
            .await?
            .map(|p| ProfileDto {
                first_name: p.first_name,
                last_name: p.last_name,
                phone: p.phone,
                photo: p.photo,
            }),
        Role::Professor => professor_profile::Entity::find()
            .filter(professor_profile::Column::UserId.eq(user.id))
            .one(db.get_ref())
            .await?
            .map(|p| ProfileDto {
                first_name: p.first_name,
                last_name: p.last_name,
                phone: p.phone,
                photo: p.photo,
            }),
        Role::SuperAdmin | Role::AdminStaff => staff_profile::Entity::find()
            .filter(staff_profile::Column::UserId.eq(user.id))
            .one(db.get_ref())
            .await?
            .map(|p| ProfileDto {
                first_name: p.first_name,
                last_name: p.last_name,
                phone: p.phone,
                photo: p.photo,
            }),
    };

    let dto = UserDetailDto {
        id: user.id,
        email: user.email,
        role: user.role,
        is_active: user.is_active,
        is_first_login: user.is_first_login,
        created_at: user.created_at.map(|d| d.to_rfc3339()),
        last_login: user.last_login.map(|d| d.to_rfc3339()),
        profile,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}

async fn toggle_user_status(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;
    let user_id = *path;

    let user = user::Entity::find_by_id(user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Utilisateur non trouvé.", "user"))?;

    if user.id == auth.user_id {
        return Err(AppError::business_rule(
            "Vous ne pouvez pas modifier votre propre statut.",
            "self_status_change",
        ));
    }
    if user.role == Role::SuperAdmin {
        require_super_admin(&auth)?;
    }

    let is_active = !user.is_active;
    let active = user::ActiveModel {
        id: Set(user.id),
        is_active: Set(is_active),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    user::Entity::update(active).exec(db.get_ref()).await?;

    let message = if is_active { "Utilisateur activé." } else { "Utilisateur désactivé." };
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(ToggleStatusResponse { is_active }, message)))
}
