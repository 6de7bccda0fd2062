use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_teaching_assignment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub professor_id: i32,
    pub module_id: i32,
    pub class_id: Option<i32>,
    pub academic_year: Option<String>,
    pub semester: Option<i32>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
