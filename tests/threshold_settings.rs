//! Global professor threshold: day/hour arithmetic and classification.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection,
              EntityTrait, QueryFilter, Set};

use scol_backend::absence::{self, ThresholdStatus};
use scol_backend::db;
use scol_backend::entity::threshold_setting;

async fn setup() -> DatabaseConnection {
    // A single pooled connection, or every statement may land on a fresh
    // in-memory database.
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await.expect("in-memory sqlite");
    db::init_schema(&db).await;
    db
}

async fn seed_setting(db: &DatabaseConnection, days: i32, hours: i32, warning: f64) {
    threshold_setting::ActiveModel {
        setting_type: Set("professor_global".to_string()),
        threshold_days: Set(days),
        threshold_hours: Set(hours),
        warning_percentage: Set(warning),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert setting");
}

async fn load_setting(db: &DatabaseConnection) -> threshold_setting::Model {
    threshold_setting::Entity::find()
        .filter(threshold_setting::Column::SettingType.eq("professor_global"))
        .one(db)
        .await
        .expect("query setting")
        .expect("setting row")
}

#[tokio::test]
async fn total_hours_counts_a_day_as_eight_hours() {
    let db = setup().await;
    seed_setting(&db, 2, 4, 50.0).await;

    let setting = load_setting(&db).await;
    assert_eq!(setting.total_hours(), 20.0);
}

#[tokio::test]
async fn professor_classification_uses_configured_warning_percentage() {
    let db = setup().await;
    seed_setting(&db, 2, 4, 75.0).await;

    let setting = load_setting(&db).await;
    let threshold = setting.total_hours();

    // 75% of 20h is 15h.
    assert_eq!(
        absence::classify(14.0, threshold, setting.warning_percentage),
        ThresholdStatus::Ok
    );
    assert_eq!(
        absence::classify(15.0, threshold, setting.warning_percentage),
        ThresholdStatus::Warning
    );
    assert_eq!(
        absence::classify(20.0, threshold, setting.warning_percentage),
        ThresholdStatus::Exceeded
    );
}

#[tokio::test]
async fn unset_threshold_never_escalates() {
    let db = setup().await;
    seed_setting(&db, 0, 0, 50.0).await;

    let setting = load_setting(&db).await;
    assert_eq!(setting.total_hours(), 0.0);
    assert_eq!(
        absence::classify(40.0, setting.total_hours(), setting.warning_percentage),
        ThresholdStatus::Ok
    );
}
