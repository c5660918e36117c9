use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::sessions;

pub use crate::entities::sessions::Model as Session;

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, session_id: &str, user_id: i32, expires_at: &str) -> Result<()> {
        let active = sessions::ActiveModel {
            id: Set(session_id.to_string()),
            user_id: Set(user_id),
            expires_at: Set(expires_at.to_string()),
            created_at: Set(super::super::now_rfc3339()),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert session")?;

        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let session = sessions::Entity::find_by_id(session_id)
            .one(&self.conn)
            .await
            .context("Failed to query session")?;

        Ok(session)
    }

    /// Idempotent: deleting an already-deleted row is a no-op. A single
    /// DELETE statement, so it tolerates a concurrent sweep removing the
    /// same row.
    pub async fn delete(&self, session_id: &str) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::Id.eq(session_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected)
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete user sessions")?;

        Ok(result.rows_affected)
    }

    /// Single-statement expiry delete, safe against concurrent validators.
    pub async fn delete_expired(&self, now: &str) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::ExpiresAt.lte(now))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected)
    }
}
