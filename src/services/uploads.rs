use axum::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::models::{Annotation, Meta};
use crate::services::images::{ImageRepository, PendingImage};
use crate::services::storage::ArtifactStore;
use crate::utils::{encoding, image_processor};

/// One file part of an upload batch.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct UploadedImage {
    pub file_name: String,
    pub base64: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UploadBatchResponse {
    pub meta: Meta,
    pub images: Vec<UploadedImage>,
    /// Annotation array per filename.
    #[schema(value_type = Object)]
    pub annotations: BTreeMap<String, Value>,
}

/// Outcome of a single per-file task. Failures are folded in here rather than
/// propagated, so a bad file never sinks its siblings.
#[derive(Debug, Clone)]
struct FileOutcome {
    file_name: String,
    annotations: Value,
    base64: String,
}

impl FileOutcome {
    fn degraded(file_name: String, base64: String) -> Self {
        Self {
            file_name,
            annotations: Value::Array(Vec::new()),
            base64,
        }
    }
}

#[derive(Clone)]
pub struct UploadCoordinator {
    images: Arc<dyn ImageRepository>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl UploadCoordinator {
    pub fn new(images: Arc<dyn ImageRepository>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { images, artifacts }
    }

    /// Process every file concurrently and wait for all of them.
    ///
    /// `annotations` is applied to every file in the batch. The response holds
    /// exactly one `images` entry per submitted file.
    pub async fn upload_batch(
        &self,
        project_id: Uuid,
        files: Vec<UploadedFile>,
        annotations: Vec<Annotation>,
        meta: Meta,
    ) -> UploadBatchResponse {
        let started = Instant::now();
        let batch_size = files.len();
        let annotations = Arc::new(annotations);

        // Each task reports `(index, outcome)`; a task that dies without
        // reporting is filled in as degraded once the channel closes.
        let (tx, mut rx) = mpsc::channel(batch_size.max(1));
        let mut names = Vec::with_capacity(batch_size);
        let mut tasks = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            names.push(file.file_name.clone());
            let images = Arc::clone(&self.images);
            let artifacts = Arc::clone(&self.artifacts);
            let annotations = Arc::clone(&annotations);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = process_file(images, artifacts, project_id, file, annotations).await;
                // Capacity equals the batch size, so this never waits.
                let _ = tx.send((index, outcome)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FileOutcome>> = vec![None; batch_size];
        while let Some((index, outcome)) = rx.recv().await {
            slots[index] = Some(outcome);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%project_id, error = %e, "upload task aborted");
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(names)
            .map(|(slot, file_name)| {
                slot.unwrap_or_else(|| FileOutcome::degraded(file_name, String::new()))
            });

        tracing::info!(
            %project_id,
            files = batch_size,
            elapsed = ?started.elapsed(),
            "upload batch complete"
        );

        let mut images = Vec::with_capacity(batch_size);
        let mut annotations_by_file = BTreeMap::new();
        for outcome in outcomes {
            images.push(UploadedImage {
                file_name: outcome.file_name.clone(),
                base64: outcome.base64,
            });
            annotations_by_file.insert(outcome.file_name, outcome.annotations);
        }

        UploadBatchResponse {
            meta,
            images,
            annotations: annotations_by_file,
        }
    }
}

async fn process_file(
    images: Arc<dyn ImageRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    project_id: Uuid,
    file: UploadedFile,
    annotations: Arc<Vec<Annotation>>,
) -> FileOutcome {
    let UploadedFile { file_name, data } = file;

    let path = match artifacts.put(&data, &file_name).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(%project_id, file = %file_name, error = %e, "failed to store upload");
            return FileOutcome::degraded(file_name, String::new());
        }
    };

    let header_bytes = data.clone();
    let (width, height) =
        tokio::task::spawn_blocking(move || image_processor::decode_dimensions(&header_bytes))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(file = %file_name, error = %e, "dimension decode task failed");
                (0, 0)
            });

    let base64 = encoding::to_data_uri(&data);

    let annotations_json = match serde_json::to_value(annotations.as_ref()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "failed to serialize annotations");
            return FileOutcome::degraded(file_name, base64);
        }
    };

    let upsert = images
        .upsert_pending(PendingImage {
            project_id,
            name: file_name.clone(),
            path: path.clone(),
            encoded_payload: base64.clone(),
            width,
            height,
            annotations: annotations.as_ref().clone(),
        })
        .await;

    if let Err(e) = upsert {
        tracing::warn!(%project_id, file = %file_name, error = %e, "failed to upsert image record");
        return FileOutcome::degraded(file_name, base64);
    }

    tracing::debug!(%project_id, file = %file_name, %path, width, height, "image stored");
    FileOutcome {
        file_name,
        annotations: annotations_json,
        base64,
    }
}
