use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_major_module")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub major_id: i32,
    pub module_id: i32,
    pub semester: i32,
    pub is_required: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
