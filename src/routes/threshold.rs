use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::auth::{require_admin, AuthUser};
use crate::entity::threshold_setting;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::seed::PROFESSOR_GLOBAL;
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/thresholds")
            .route(web::get().to(get_thresholds))
            .route(web::put().to(update_threshold)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateThresholdRequest {
    setting_type: Option<String>,
    threshold_days: Option<i32>,
    threshold_hours: Option<i32>,
    warning_percentage: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdSettingDto {
    id: i32,
    setting_type: String,
    threshold_days: i32,
    threshold_hours: i32,
    warning_percentage: f64,
    total_hours: f64,
    updated_at: Option<String>,
}

/// The global professor threshold row, if configured.
pub(crate) async fn global_setting(
    db: &DatabaseConnection,
) -> Result<Option<threshold_setting::Model>, AppError> {
    let setting = threshold_setting::Entity::find()
        .filter(threshold_setting::Column::SettingType.eq(PROFESSOR_GLOBAL))
        .one(db)
        .await?;
    Ok(setting)
}

fn to_dto(s: threshold_setting::Model) -> ThresholdSettingDto {
    let total_hours = s.total_hours();
    ThresholdSettingDto {
        id: s.id,
        setting_type: s.setting_type,
        threshold_days: s.threshold_days,
        threshold_hours: s.threshold_hours,
        warning_percentage: s.warning_percentage,
        total_hours,
        updated_at: s.updated_at.map(|d| d.to_rfc3339()),
    }
}

async fn get_thresholds(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;
    let settings = threshold_setting::Entity::find().all(db.get_ref()).await?;
    let list: Vec<ThresholdSettingDto> = settings.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::data(list)))
}

async fn update_threshold(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<UpdateThresholdRequest>,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth)?;

    let setting_type = payload
        .setting_type
        .clone()
        .unwrap_or_else(|| PROFESSOR_GLOBAL.to_string());
    let threshold_days = payload.threshold_days.unwrap_or(0);
    let threshold_hours = payload.threshold_hours.unwrap_or(0);
    let warning_percentage = payload.warning_percentage.unwrap_or(50.0);

    if threshold_days < 0 {
        return Err(AppError::validation_field("Les jours doivent être >= 0.", "thresholdDays"));
    }
    if !(0..=23).contains(&threshold_hours) {
        return Err(AppError::validation_field(
            "Les heures doivent être entre 0 et 23.",
            "thresholdHours",
        ));
    }
    validate::warning_percentage(warning_percentage)?;
    if threshold_days == 0 && threshold_hours == 0 {
        return Err(AppError::business_rule(
            "Le seuil doit être supérieur à 0.",
            "threshold_positive",
        ));
    }

    let now = Utc::now();
    let existing = threshold_setting::Entity::find()
        .filter(threshold_setting::Column::SettingType.eq(setting_type.clone()))
        .one(db.get_ref())
        .await?;

    let updated = match existing {
        Some(setting) => {
            let active = threshold_setting::ActiveModel {
                id: Set(setting.id),
                threshold_days: Set(threshold_days),
                threshold_hours: Set(threshold_hours),
                warning_percentage: Set(warning_percentage),
                updated_by_id: Set(Some(auth.user_id)),
                updated_at: Set(Some(now)),
                ..Default::default()
            };
            threshold_setting::Entity::update(active).exec(db.get_ref()).await?
        }
        None => {
            threshold_setting::ActiveModel {
                setting_type: Set(setting_type),
                threshold_days: Set(threshold_days),
                threshold_hours: Set(threshold_hours),
                warning_percentage: Set(warning_percentage),
                updated_by_id: Set(Some(auth.user_id)),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(db.get_ref())
            .await?
        }
    };

    Ok(HttpResponse::Ok()
        .json(ApiResponse::with_message(to_dto(updated), "Seuil mis à jour avec succès.")))
}
