use sea_orm::entity::prelude::*;

/// One row per active session. Rows are never updated in place;
/// a refresh deletes the old row and inserts a new one.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque random session token (64-char hex string).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: i32,

    /// RFC 3339, second precision. Fixed-width so string order is time order.
    pub expires_at: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
