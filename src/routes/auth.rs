use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, Claims};
use crate::config::AppConfig;
use crate::entity::user::{self, Role};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::routes::user::full_name;
use crate::validate;

/// Token lifetime matches the original 8 hour session.
const TOKEN_LIFETIME_HOURS: i64 = 8;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(web::resource("/change-password").route(web::post().to(change_password)))
        .service(web::resource("/me").route(web::get().to(me)));
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: i32,
    email: String,
    role: Role,
    full_name: String,
    is_first_login: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    id: i32,
    email: String,
    role: Role,
    full_name: String,
    is_active: bool,
    is_first_login: bool,
    last_login: Option<String>,
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = payload.email.clone().unwrap_or_default().to_lowercase();
    let password = payload.password.clone().unwrap_or_default();
    validate::required(&email, "email")?;
    validate::required(&password, "password")?;

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| AppError::Authentication("Email ou mot de passe incorrect.".to_string()))?;

    let ok = verify(&password, &user.password_hash)
        .map_err(|_| AppError::Database("Erreur de base de données.".to_string()))?;
    if !ok {
        return Err(AppError::Authentication("Email ou mot de passe incorrect.".to_string()));
    }

    if !user.is_active {
        return Err(AppError::Authentication(
            "Votre compte est désactivé. Contactez l'administration.".to_string(),
        ));
    }

    let mut active = user::ActiveModel {
        id: Set(user.id),
        last_login: Set(Some(Utc::now())),
        ..Default::default()
    };
    active.updated_at = Set(Some(Utc::now()));
    user::Entity::update(active).exec(db.get_ref()).await?;

    let exp = (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp() as usize;
    let claims = Claims { sub: user.id, exp };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::Database("Erreur de base de données.".to_string()))?;

    let full_name = full_name(db.get_ref(), &user).await?;
    let response = LoginResponse {
        token,
        user_id: user.id,
        email: user.email,
        role: user.role,
        full_name,
        is_first_login: user.is_first_login,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(response)))
}

async fn logout(_auth: AuthUser) -> Result<HttpResponse, AppError> {
    // Stateless tokens: nothing to revoke server side.
    Ok(HttpResponse::Ok().json(ApiResponse::message("Déconnexion réussie.")))
}

async fn change_password(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let current = payload.current_password.clone().unwrap_or_default();
    let new = payload.new_password.clone().unwrap_or_default();
    validate::required(&current, "currentPassword")?;
    validate::password(&new)?;

    let user = user::Entity::find_by_id(auth.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(AppError::need_login)?;

    let ok = verify(&current, &user.password_hash)
        .map_err(|_| AppError::Database("Erreur de base de données.".to_string()))?;
    if !ok {
        return Err(AppError::validation_field(
            "Mot de passe actuel incorrect.",
            "currentPassword",
        ));
    }

    let hashed = hash(&new, bcrypt::DEFAULT_COST)
        .map_err(|_| AppError::Database("Erreur de base de données.".to_string()))?;
    let active = user::ActiveModel {
        id: Set(user.id),
        password_hash: Set(hashed),
        is_first_login: Set(false),
        initial_password: Set(None),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    user::Entity::update(active).exec(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Mot de passe modifié avec succès.")))
}

async fn me(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let user = user::Entity::find_by_id(auth.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(AppError::need_login)?;

    let full_name = full_name(db.get_ref(), &user).await?;
    let dto = MeResponse {
        id: user.id,
        email: user.email,
        role: user.role,
        full_name,
        is_active: user.is_active,
        is_first_login: user.is_first_login,
        last_login: user.last_login.map(|d| d.to_rfc3339()),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::data(dto)))
}
