use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::models::Meta;
use crate::services::groundtruth::GroundTruthService;
use crate::services::images::{ImageRepository, SeaOrmImageRepository};
use crate::services::storage::ArtifactStore;
use crate::services::uploads::UploadCoordinator;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub images: Arc<dyn ImageRepository>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, artifacts: Arc<dyn ArtifactStore>, config: Config) -> Self {
        Self {
            images: Arc::new(SeaOrmImageRepository::new(db.clone())),
            db,
            artifacts,
            config: Arc::new(config),
        }
    }

    pub fn upload_coordinator(&self) -> UploadCoordinator {
        UploadCoordinator::new(Arc::clone(&self.images), Arc::clone(&self.artifacts))
    }

    pub fn ground_truth(&self) -> GroundTruthService {
        GroundTruthService::new(Arc::clone(&self.images), Arc::clone(&self.artifacts))
    }

    /// Envelope stamped on upload responses.
    pub fn response_meta(&self) -> Meta {
        Meta::now(&self.config.annotation_tool, &self.config.annotation_lang)
    }
}
