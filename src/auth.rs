use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::entity::user::{self, Role};
use crate::error::AppError;

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let db = match req.app_data::<web::Data<DatabaseConnection>>() {
            Some(db) => db.clone(),
            None => {
                return Box::pin(async { Err(AppError::Database("app state missing".to_string()).into()) });
            }
        };
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => {
                return Box::pin(async { Err(AppError::Database("app state missing".to_string()).into()) });
            }
        };
        let token = extract_token(req, &config);

        Box::pin(async move {
            let token = token.ok_or_else(AppError::need_login)?;
            let auth = authenticate_token(&db, &config, &token).await?;
            Ok(auth)
        })
    }
}

fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let header = config.token_header.as_str();
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn authenticate_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    token: &str,
) -> Result<AuthUser, AppError> {
    let claims = decode_jwt(config, token)?;
    let user = user::Entity::find_by_id(claims.sub)
        .one(db)
        .await?
        .ok_or_else(AppError::need_login)?;

    if !user.is_active {
        return Err(AppError::Authentication(
            "Votre compte est désactivé. Contactez l'administration.".to_string(),
        ));
    }

    Ok(AuthUser { user_id: user.id, role: user.role })
}

fn decode_jwt(config: &AppConfig, token: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::need_login())
}

pub fn require_admin(auth: &AuthUser) -> Result<(), AppError> {
    if !auth.role.is_admin() {
        return Err(AppError::forbidden());
    }
    Ok(())
}

pub fn require_super_admin(auth: &AuthUser) -> Result<(), AppError> {
    if auth.role != Role::SuperAdmin {
        return Err(AppError::forbidden());
    }
    Ok(())
}

pub fn require_role(auth: &AuthUser, roles: &[Role]) -> Result<(), AppError> {
    if !roles.contains(&auth.role) {
        return Err(AppError::forbidden());
    }
    Ok(())
}
