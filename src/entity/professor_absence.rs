use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_professor_absence")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub professor_id: i32,
    pub date: Date,
    pub hours: f64,
    pub reason: Option<String>,
    pub is_justified: bool,
    pub justification_document: Option<String>,
    pub recorded_by_id: Option<i32>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
