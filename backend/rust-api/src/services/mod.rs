use crate::config::{Config, StorageBackend};
use crate::middlewares::auth::JwtService;
use crate::storage::{JsonFileStore, MongoStore, QuizStore, StoreError};
use anyhow::Context;
use std::sync::Arc;

pub mod adaptive_service;
pub mod analytics_service;
pub mod auth_service;
pub mod question_service;
pub mod quiz_service;
pub mod superuser_seed;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn QuizStore>,
    pub jwt: JwtService,
}

impl AppState {
    /// Opens the configured storage backend
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn QuizStore> = match config.storage_backend {
            StorageBackend::Mongo => {
                tracing::info!("Connecting to MongoDB...");
                let store = tokio::time::timeout(
                    std::time::Duration::from_secs(30),
                    MongoStore::connect(&config.mongo_uri, &config.mongo_database),
                )
                .await
                .map_err(|_| anyhow::anyhow!("MongoDB connection timeout after 30s"))?
                .context("Failed to connect to MongoDB")?;
                Arc::new(store)
            }
            StorageBackend::Json => Arc::new(
                JsonFileStore::open(&config.json_data_dir)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to open JSON store at {}",
                            config.json_data_dir.display()
                        )
                    })?,
            ),
        };

        tracing::info!(backend = store.backend_name(), "Storage backend ready");
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn QuizStore>) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        Self { config, store, jwt }
    }
}

/// Failure of a service operation; handlers map each variant to a status code
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
