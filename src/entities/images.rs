use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub filename: String,

    pub filepath: String,

    #[sea_orm(unique)]
    pub url: String,

    /// "temp", "recipe" or "user".
    pub image_type: String,

    /// Set when the image has been promoted to a recipe.
    pub recipe_id: Option<i32>,

    pub created_at: String,

    /// A temp image stays unused until promoted; a recipe image is always used.
    pub used: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
