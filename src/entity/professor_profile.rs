use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_professor_profile")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub office: Option<String>,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub photo: Option<String>,
    pub hire_date: Option<Date>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
