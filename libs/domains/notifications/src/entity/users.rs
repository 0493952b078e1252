use crate::models::DirectoryUser;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub plant: String,
    pub is_admin: bool,
    pub is_supervisor: bool,
    pub password_hash: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DirectoryUser {
    fn from(model: Model) -> Self {
        Self {
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            plant: model.plant,
            is_admin: model.is_admin,
            is_supervisor: model.is_supervisor,
            has_credentials: model.password_hash.is_some(),
        }
    }
}
