use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Display name shown in the UI.
    pub name: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// Either "user" or "admin".
    pub role: String,

    /// Disabled accounts may never hold a valid session.
    pub is_active: bool,

    pub created_at: String,

    pub updated_at: String,

    pub last_login_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
