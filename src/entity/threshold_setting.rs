use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_threshold_setting")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub setting_type: String,
    pub threshold_days: i32,
    pub threshold_hours: i32,
    pub warning_percentage: f64,
    pub updated_by_id: Option<i32>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// Total threshold in hours, one day counting as 8 hours.
    pub fn total_hours(&self) -> f64 {
        (self.threshold_days * 8 + self.threshold_hours) as f64
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
