use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::images;

pub use crate::entities::images::Model as ImageRecord;

#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub filepath: String,
    pub url: String,
    pub image_type: String,
    pub recipe_id: Option<i32>,
    pub used: bool,
}

/// Fields rewritten when a temp image is promoted to a recipe image.
#[derive(Debug, Clone)]
pub struct ImagePromotion {
    pub filename: String,
    pub filepath: String,
    pub url: String,
    pub recipe_id: i32,
}

pub struct ImageRepository {
    conn: DatabaseConnection,
}

impl ImageRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, image: NewImage) -> Result<ImageRecord> {
        let active = images::ActiveModel {
            filename: Set(image.filename),
            filepath: Set(image.filepath),
            url: Set(image.url),
            image_type: Set(image.image_type),
            recipe_id: Set(image.recipe_id),
            created_at: Set(super::super::now_rfc3339()),
            used: Set(image.used),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert image record")?;

        Ok(model)
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<ImageRecord>> {
        let image = images::Entity::find()
            .filter(images::Column::Url.eq(url))
            .one(&self.conn)
            .await
            .context("Failed to query image by URL")?;

        Ok(image)
    }

    /// Rewrite a temp record in place: new location, recipe ownership,
    /// `used` flipped. Returns affected row count (0 if the URL vanished).
    pub async fn promote(&self, old_url: &str, promotion: ImagePromotion) -> Result<u64> {
        let result = images::Entity::update_many()
            .col_expr(images::Column::Filename, promotion.filename.into())
            .col_expr(images::Column::Filepath, promotion.filepath.into())
            .col_expr(images::Column::Url, promotion.url.into())
            .col_expr(images::Column::ImageType, "recipe".into())
            .col_expr(images::Column::RecipeId, promotion.recipe_id.into())
            .col_expr(images::Column::Used, true.into())
            .filter(images::Column::Url.eq(old_url))
            .exec(&self.conn)
            .await
            .context("Failed to promote image record")?;

        Ok(result.rows_affected)
    }

    pub async fn delete_by_url(&self, url: &str) -> Result<u64> {
        let result = images::Entity::delete_many()
            .filter(images::Column::Url.eq(url))
            .exec(&self.conn)
            .await
            .context("Failed to delete image record")?;

        Ok(result.rows_affected)
    }

    /// Unpromoted temp images created before the cutoff, oldest first.
    pub async fn unused_temp_before(&self, cutoff: &str) -> Result<Vec<ImageRecord>> {
        let records = images::Entity::find()
            .filter(images::Column::ImageType.eq("temp"))
            .filter(images::Column::Used.eq(false))
            .filter(images::Column::CreatedAt.lt(cutoff))
            .order_by_asc(images::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query unused temp images")?;

        Ok(records)
    }

    pub async fn recipe_images(&self, recipe_id: i32) -> Result<Vec<ImageRecord>> {
        let records = images::Entity::find()
            .filter(images::Column::ImageType.eq("recipe"))
            .filter(images::Column::RecipeId.eq(recipe_id))
            .order_by_asc(images::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query recipe images")?;

        Ok(records)
    }

    pub async fn all_recipe_images(&self) -> Result<Vec<ImageRecord>> {
        let records = images::Entity::find()
            .filter(images::Column::ImageType.eq("recipe"))
            .order_by_asc(images::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query recipe images")?;

        Ok(records)
    }
}
