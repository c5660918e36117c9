use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::image::{ImagePromotion, ImageRecord, NewImage};
pub use repositories::session::Session;
pub use repositories::user::{NewUser, User, UserListFilter, UserUpdate};

/// Current time as RFC 3339 at second precision (`2026-08-27T12:00:00Z`).
/// Fixed-width, so lexicographic comparison in SQL matches time order.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// RFC 3339 timestamp a signed number of seconds from now.
#[must_use]
pub fn rfc3339_from_now(seconds: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(seconds))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn image_repo(&self) -> repositories::image::ImageRepository {
        repositories::image::ImageRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo()
            .get_by_username_with_password(username)
            .await
    }

    pub async fn get_user_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_email_with_password(email).await
    }

    pub async fn get_user_password_hash(&self, user_id: i32) -> Result<Option<String>> {
        self.user_repo().get_password_hash(user_id).await
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.user_repo().create(new_user).await
    }

    pub async fn update_user_password(&self, user_id: i32, new_hash: String) -> Result<()> {
        self.user_repo().update_password(user_id, new_hash).await
    }

    pub async fn touch_user_last_login(&self, user_id: i32) -> Result<()> {
        self.user_repo().touch_last_login(user_id).await
    }

    pub async fn update_user_account(&self, id: i32, update: UserUpdate) -> Result<Option<User>> {
        self.user_repo().update_account(id, update).await
    }

    /// Sessions referencing the user are removed first; a deleted user must
    /// not leave valid sessions behind.
    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.session_repo().delete_for_user(id).await?;
        self.user_repo().delete(id).await
    }

    pub async fn list_users(&self, filter: UserListFilter) -> Result<(Vec<User>, u64)> {
        self.user_repo().list(filter).await
    }

    // ========== Session Repository Methods ==========

    pub async fn create_session(
        &self,
        session_id: &str,
        user_id: i32,
        expires_at: &str,
    ) -> Result<()> {
        self.session_repo()
            .create(session_id, user_id, expires_at)
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.session_repo().get(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<u64> {
        self.session_repo().delete(session_id).await
    }

    pub async fn delete_user_sessions(&self, user_id: i32) -> Result<u64> {
        self.session_repo().delete_for_user(user_id).await
    }

    pub async fn delete_expired_sessions(&self, now: &str) -> Result<u64> {
        self.session_repo().delete_expired(now).await
    }

    // ========== Image Repository Methods ==========

    pub async fn insert_image(&self, image: NewImage) -> Result<ImageRecord> {
        self.image_repo().insert(image).await
    }

    pub async fn get_image_by_url(&self, url: &str) -> Result<Option<ImageRecord>> {
        self.image_repo().get_by_url(url).await
    }

    pub async fn promote_image(&self, old_url: &str, promotion: ImagePromotion) -> Result<u64> {
        self.image_repo().promote(old_url, promotion).await
    }

    pub async fn delete_image_by_url(&self, url: &str) -> Result<u64> {
        self.image_repo().delete_by_url(url).await
    }

    pub async fn unused_temp_images_before(&self, cutoff: &str) -> Result<Vec<ImageRecord>> {
        self.image_repo().unused_temp_before(cutoff).await
    }

    pub async fn recipe_images(&self, recipe_id: i32) -> Result<Vec<ImageRecord>> {
        self.image_repo().recipe_images(recipe_id).await
    }

    pub async fn all_recipe_images(&self) -> Result<Vec<ImageRecord>> {
        self.image_repo().all_recipe_images().await
    }
}
