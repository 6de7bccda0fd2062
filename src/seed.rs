use bcrypt::hash;
use chrono::Utc;
use log::{error, info};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::config::AppConfig;
use crate::entity::user::Role;
use crate::entity::{staff_profile, threshold_setting, user};

pub const PROFESSOR_GLOBAL: &str = "professor_global";

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Ensures the database has a super admin and the global professor threshold
/// row. Runs at every startup, inserts only what is missing.
pub async fn init_defaults(db: &DatabaseConnection, config: &AppConfig) {
    if let Err(e) = ensure_super_admin(db, config).await {
        error!("super admin seeding failed: {}", e);
    }
    if let Err(e) = ensure_threshold_setting(db, config).await {
        error!("threshold setting seeding failed: {}", e);
    }
}

async fn ensure_super_admin(db: &DatabaseConnection, config: &AppConfig) -> Result<(), sea_orm::DbErr> {
    let existing = user::Entity::find()
        .filter(user::Column::Role.eq(Role::SuperAdmin))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = match hash(DEFAULT_ADMIN_PASSWORD, bcrypt::DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("password hashing failed: {}", e);
            return Ok(());
        }
    };

    let now = Utc::now();
    let admin = user::ActiveModel {
        email: Set(config.admin_email.clone()),
        password_hash: Set(password_hash),
        role: Set(Role::SuperAdmin),
        is_active: Set(true),
        is_first_login: Set(false),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };
    let admin = admin.insert(db).await?;

    let profile = staff_profile::ActiveModel {
        user_id: Set(admin.id),
        employee_id: Set("ADMIN001".to_string()),
        first_name: Set("Super".to_string()),
        last_name: Set("Admin".to_string()),
        position: Set(Some("Administrateur Système".to_string())),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };
    profile.insert(db).await?;

    info!("super admin created: {} / {}", config.admin_email, DEFAULT_ADMIN_PASSWORD);
    Ok(())
}

async fn ensure_threshold_setting(
    db: &DatabaseConnection,
    config: &AppConfig,
) -> Result<(), sea_orm::DbErr> {
    let existing = threshold_setting::Entity::find()
        .filter(threshold_setting::Column::SettingType.eq(PROFESSOR_GLOBAL))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let now = Utc::now();
    let setting = threshold_setting::ActiveModel {
        setting_type: Set(PROFESSOR_GLOBAL.to_string()),
        threshold_days: Set(config.default_professor_threshold_days),
        threshold_hours: Set(config.default_professor_threshold_hours),
        warning_percentage: Set(config.warning_percentage),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };
    setting.insert(db).await?;
    info!("default professor threshold setting created");
    Ok(())
}
