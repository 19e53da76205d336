use axum::http::StatusCode;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Annotation, Meta};
use crate::services::images::{FinalizedImage, ImageRecord, ImageRepository};
use crate::services::storage::{ArtifactStore, StorageError};
use crate::utils::encoding;

/// Promotes a pending image to ground truth.
///
/// Steps run strictly in order and the record update is the last one, so any
/// failure before it leaves the stored record exactly as it was. A failure
/// after the artifact moved moves it back.
#[derive(Clone)]
pub struct GroundTruthService {
    images: Arc<dyn ImageRepository>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl GroundTruthService {
    pub fn new(images: Arc<dyn ImageRepository>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { images, artifacts }
    }

    pub async fn finalize(
        &self,
        project_id: Uuid,
        filename: &str,
        annotations: Vec<Annotation>,
        meta: Meta,
    ) -> Result<ImageRecord, AppError> {
        let image = self
            .images
            .find_by_key(project_id, filename)
            .await
            .map_err(|e| {
                AppError::detailed(StatusCode::INTERNAL_SERVER_ERROR, "Failed to look up image", e)
            })?
            .ok_or_else(|| {
                AppError::detailed(
                    StatusCode::NOT_FOUND,
                    "Image not found",
                    format!("no image named {} in project {}", filename, project_id),
                )
            })?;

        let final_path = self
            .artifacts
            .relocate(&image.path)
            .await
            .map_err(|e: StorageError| {
                AppError::detailed(StatusCode::INTERNAL_SERVER_ERROR, "Failed to move file", e)
            })?;

        let updated = match self.attach(image.id, &final_path, annotations, meta).await {
            Ok(updated) => updated,
            Err(err) => {
                // Put the artifact back where the record still points.
                if let Err(e) = self.artifacts.restore(&final_path, &image.path).await {
                    tracing::error!(
                        %project_id,
                        file = %filename,
                        error = %e,
                        "failed to restore artifact after aborted finalization"
                    );
                }
                return Err(err);
            }
        };

        tracing::info!(
            %project_id,
            file = %filename,
            path = %updated.path,
            annotations = updated.annotations.len(),
            "ground truth saved"
        );
        Ok(updated)
    }

    async fn attach(
        &self,
        id: Uuid,
        final_path: &str,
        annotations: Vec<Annotation>,
        meta: Meta,
    ) -> Result<ImageRecord, AppError> {
        let data = self.artifacts.read(final_path).await.map_err(|e| {
            AppError::detailed(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file for Base64",
                e,
            )
        })?;

        self.images
            .mark_final(
                id,
                FinalizedImage {
                    path: final_path.to_string(),
                    encoded_payload: encoding::to_data_uri(&data),
                    annotations,
                    meta,
                },
            )
            .await
            .map_err(|e| {
                AppError::detailed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update image in DB",
                    e,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::image::Status;
    use crate::models::Rect;
    use crate::services::images::tests::{insert_project, setup_db, FlakyRepository};
    use crate::services::images::SeaOrmImageRepository;
    use crate::services::storage::LocalArtifactStore;
    use crate::services::uploads::{UploadCoordinator, UploadedFile};
    use crate::utils::image_processor::tests::encode_test_image;
    use axum::body::Bytes;
    use image::ImageFormat;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<LocalArtifactStore>,
        repo: Arc<SeaOrmImageRepository>,
        project_id: Uuid,
    }

    async fn fixture_with_upload(name: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().await;
        let project_id = insert_project(&db).await;
        let repo = Arc::new(SeaOrmImageRepository::new(db));
        let store = Arc::new(LocalArtifactStore::new(dir.path()));

        UploadCoordinator::new(repo.clone(), store.clone())
            .upload_batch(
                project_id,
                vec![UploadedFile {
                    file_name: name.to_string(),
                    data: Bytes::from(encode_test_image(100, 80, ImageFormat::Jpeg)),
                }],
                vec![Annotation {
                    id: "provisional".into(),
                    ..Default::default()
                }],
                Meta::default(),
            )
            .await;

        Fixture {
            _dir: dir,
            store,
            repo,
            project_id,
        }
    }

    fn cat_box() -> Annotation {
        Annotation {
            id: "a1".into(),
            label: "cat".into(),
            rect: Rect { x: 10.0, y: 10.0, w: 20.0, h: 20.0 },
            kind: "box".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn finalize_moves_artifact_and_replaces_annotations() {
        let fx = fixture_with_upload("cat.jpg").await;
        let service = GroundTruthService::new(fx.repo.clone(), fx.store.clone());
        let before = fx.repo.find_by_key(fx.project_id, "cat.jpg").await.unwrap().unwrap();

        let meta = Meta::now("Khmer Data Annotation Tool", "khm");
        let record = service
            .finalize(fx.project_id, "cat.jpg", vec![cat_box()], meta.clone())
            .await
            .unwrap();

        assert_eq!(record.status, Status::Final);
        assert_eq!(record.annotations, vec![cat_box()]);
        assert_eq!(record.meta, Some(meta));
        assert!(Path::new(&record.path).starts_with(fx.store.final_dir()));
        assert!(record.path.ends_with("_cat.jpg"));
        assert!(!Path::new(&before.path).exists());
        // Same bytes, so the same encoding.
        assert_eq!(record.encoded_payload, before.encoded_payload);

        let stored = fx.repo.find_by_key(fx.project_id, "cat.jpg").await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Final);
        assert_eq!(stored.annotations, record.annotations);
        assert_eq!(stored.path, record.path);
    }

    #[tokio::test]
    async fn unknown_image_is_not_found() {
        let fx = fixture_with_upload("cat.jpg").await;
        let service = GroundTruthService::new(fx.repo.clone(), fx.store.clone());

        let err = service
            .finalize(fx.project_id, "dog.jpg", vec![], Meta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Detailed { status: StatusCode::NOT_FOUND, .. }));
    }

    #[tokio::test]
    async fn failed_relocation_leaves_record_untouched() {
        let fx = fixture_with_upload("cat.jpg").await;
        let service = GroundTruthService::new(fx.repo.clone(), fx.store.clone());
        let before = fx.repo.find_by_key(fx.project_id, "cat.jpg").await.unwrap().unwrap();

        std::fs::remove_file(&before.path).unwrap();

        let err = service
            .finalize(fx.project_id, "cat.jpg", vec![cat_box()], Meta::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Detailed { status: StatusCode::INTERNAL_SERVER_ERROR, ref error, .. } if error == "Failed to move file"
        ));

        let after = fx.repo.find_by_key(fx.project_id, "cat.jpg").await.unwrap().unwrap();
        assert_eq!(after.path, before.path);
        assert_eq!(after.status, Status::Pending);
        assert_eq!(after.annotations, before.annotations);
    }

    #[tokio::test]
    async fn finalizing_twice_keeps_the_final_artifact() {
        let fx = fixture_with_upload("cat.jpg").await;
        let service = GroundTruthService::new(fx.repo.clone(), fx.store.clone());

        let first = service
            .finalize(fx.project_id, "cat.jpg", vec![cat_box()], Meta::default())
            .await
            .unwrap();
        let second = service
            .finalize(fx.project_id, "cat.jpg", vec![], Meta::default())
            .await
            .unwrap();

        assert_eq!(second.path, first.path);
        assert!(second.annotations.is_empty());
        assert!(Path::new(&second.path).exists());
    }

    /// Local store whose reads always fail.
    struct UnreadableStore {
        inner: LocalArtifactStore,
    }

    #[async_trait::async_trait]
    impl ArtifactStore for UnreadableStore {
        async fn put(&self, data: &[u8], suggested_name: &str) -> Result<String, StorageError> {
            self.inner.put(data, suggested_name).await
        }

        async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::PermissionDenied(path.to_string()))
        }

        async fn relocate(&self, path: &str) -> Result<String, StorageError> {
            self.inner.relocate(path).await
        }

        async fn restore(&self, current: &str, original: &str) -> Result<(), StorageError> {
            self.inner.restore(current, original).await
        }
    }

    async fn upload_cat(images: Arc<dyn ImageRepository>, artifacts: Arc<dyn ArtifactStore>, project_id: Uuid) {
        UploadCoordinator::new(images, artifacts)
            .upload_batch(
                project_id,
                vec![UploadedFile {
                    file_name: "cat.jpg".to_string(),
                    data: Bytes::from(encode_test_image(100, 80, ImageFormat::Jpeg)),
                }],
                vec![],
                Meta::default(),
            )
            .await;
    }

    #[tokio::test]
    async fn failed_db_update_moves_artifact_back_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().await;
        let project_id = insert_project(&db).await;
        let repo = Arc::new(FlakyRepository::new(db));
        let store = Arc::new(LocalArtifactStore::new(dir.path()));
        upload_cat(repo.clone(), store.clone(), project_id).await;
        let service = GroundTruthService::new(repo.clone(), store.clone());
        let before = repo.find_by_key(project_id, "cat.jpg").await.unwrap().unwrap();

        repo.fail_mark_final.store(true, Ordering::SeqCst);
        let err = service
            .finalize(project_id, "cat.jpg", vec![cat_box()], Meta::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Detailed { status: StatusCode::INTERNAL_SERVER_ERROR, ref error, ref details }
                if error == "Failed to update image in DB" && details.contains("db down")
        ));

        let after = repo.find_by_key(project_id, "cat.jpg").await.unwrap().unwrap();
        assert_eq!(after.status, Status::Pending);
        assert_eq!(after.path, before.path);
        assert!(Path::new(&after.path).exists());
        assert!(!store.final_dir().join(Path::new(&before.path).file_name().unwrap()).exists());

        repo.fail_mark_final.store(false, Ordering::SeqCst);
        let record = service
            .finalize(project_id, "cat.jpg", vec![cat_box()], Meta::default())
            .await
            .unwrap();
        assert_eq!(record.status, Status::Final);
        assert!(Path::new(&record.path).exists());
    }

    #[tokio::test]
    async fn failed_read_moves_artifact_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = setup_db().await;
        let project_id = insert_project(&db).await;
        let repo = Arc::new(SeaOrmImageRepository::new(db));
        let store = Arc::new(UnreadableStore {
            inner: LocalArtifactStore::new(dir.path()),
        });
        upload_cat(repo.clone(), store.clone(), project_id).await;
        let before = repo.find_by_key(project_id, "cat.jpg").await.unwrap().unwrap();

        let err = GroundTruthService::new(repo.clone(), store.clone())
            .finalize(project_id, "cat.jpg", vec![cat_box()], Meta::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Detailed { status: StatusCode::INTERNAL_SERVER_ERROR, ref error, .. }
                if error == "Failed to read file for Base64"
        ));

        let after = repo.find_by_key(project_id, "cat.jpg").await.unwrap().unwrap();
        assert_eq!(after.status, Status::Pending);
        assert_eq!(after.path, before.path);
        assert!(Path::new(&after.path).exists());
    }
}
