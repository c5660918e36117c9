use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, ImageService, SeaOrmAuthService, SessionService};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub sessions: SessionService,

    pub auth: Arc<dyn AuthService>,

    pub images: Arc<ImageService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let sessions = SessionService::new(store.clone());

        let auth = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            sessions.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let images = Arc::new(ImageService::new(store.clone(), config.images.clone()));

        let config = Arc::new(RwLock::new(config));

        Ok(Self {
            config,
            store,
            sessions,
            auth,
            images,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
