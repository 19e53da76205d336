use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::S3Settings;
use crate::services::storage::{unique_artifact_name, ArtifactStore, StorageError};
use crate::utils::image_processor::sniff_mime_type;

/// Characters left as-is in a `CopySource` key segment.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `x-amz-copy-source` value: `{bucket}/{key}` with every key segment
/// percent-encoded and the separators kept.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect();
    format!("{}/{}", bucket, encoded.join("/"))
}

/// Object storage backend. Keys live under `{prefix}/temp/` while pending
/// and `{prefix}/final/` once finalized.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: Client,
    bucket_name: String,
    prefix: String,
}

impl S3ArtifactStore {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "manual_config",
        );

        let region = aws_sdk_s3::config::Region::new(settings.region.clone());

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials);

        if let Some(endpoint) = &settings.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket_name: settings.bucket_name.clone(),
            prefix: settings.prefix.trim_matches('/').to_string(),
        }
    }

    fn working_key(&self, name: &str) -> String {
        format!("{}/temp/{}", self.prefix, name)
    }

    fn final_key(&self, key: &str) -> String {
        let base = key.rsplit('/').next().unwrap_or(key);
        format!("{}/final/{}", self.prefix, base)
    }

    pub async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        if self.client.head_bucket().bucket(&self.bucket_name).send().await.is_ok() {
            return Ok(());
        }

        tracing::info!(bucket = %self.bucket_name, "bucket does not exist, attempting to create");
        self.client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "failed to create bucket");
                StorageError::Remote(format!("failed to create bucket: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, data: &[u8], suggested_name: &str) -> Result<String, StorageError> {
        let key = self.working_key(&unique_artifact_name(suggested_name));

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(sniff_mime_type(data))
            // Refuse to clobber an object that already sits under this key.
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, %key, "s3 upload error");
                StorageError::Remote(format!("failed to upload {}: {}", key, e))
            })?;

        Ok(key)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(path.to_string())
                } else {
                    tracing::error!(error = ?e, key = %path, "s3 download error");
                    StorageError::Remote(format!("failed to download {}: {}", path, e))
                }
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            tracing::error!(error = ?e, key = %path, "s3 body error");
            StorageError::Remote(format!("failed to read body of {}", path))
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn relocate(&self, path: &str) -> Result<String, StorageError> {
        let target = self.final_key(path);
        if target == path {
            return Ok(target);
        }
        self.move_object(path, &target).await?;
        Ok(target)
    }

    async fn restore(&self, current: &str, original: &str) -> Result<(), StorageError> {
        if current == original {
            return Ok(());
        }
        self.move_object(current, original).await
    }
}

impl S3ArtifactStore {
    /// Copy `source` to `target`, then delete `source`.
    async fn move_object(&self, source: &str, target: &str) -> Result<(), StorageError> {
        self.client
            .copy_object()
            .bucket(&self.bucket_name)
            .copy_source(copy_source(&self.bucket_name, source))
            .key(target)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .raw_response()
                    .is_some_and(|raw| raw.status().as_u16() == 404);
                if not_found {
                    StorageError::NotFound(source.to_string())
                } else {
                    tracing::error!(error = ?e, key = %source, "s3 copy error");
                    StorageError::Remote(format!("failed to copy {}: {}", source, e))
                }
            })?;

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(source)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %source, "s3 delete error");
                StorageError::Remote(format!("failed to delete {}", source))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> S3ArtifactStore {
        S3ArtifactStore::new(&S3Settings {
            bucket_name: "annotations".into(),
            region: "us-east-1".into(),
            access_key_id: "test".into(),
            secret_access_key: "test".into(),
            endpoint: Some("http://127.0.0.1:9000".into()),
            prefix: "/uploads/".into(),
        })
    }

    #[test]
    fn keys_follow_working_and_final_layout() {
        let store = store();
        assert_eq!(store.working_key("1_ab_cat.jpg"), "uploads/temp/1_ab_cat.jpg");
        assert_eq!(store.final_key("uploads/temp/1_ab_cat.jpg"), "uploads/final/1_ab_cat.jpg");
        assert_eq!(store.final_key("uploads/final/1_ab_cat.jpg"), "uploads/final/1_ab_cat.jpg");
    }

    #[test]
    fn copy_source_encodes_each_key_segment() {
        assert_eq!(
            copy_source("annotations", "uploads/temp/1_ab_my cat.jpg"),
            "annotations/uploads/temp/1_ab_my%20cat.jpg"
        );
        assert_eq!(
            copy_source("annotations", "uploads/temp/ស 1.jpg"),
            "annotations/uploads/temp/%E1%9E%9F%201.jpg"
        );
        assert_eq!(
            copy_source("annotations", "uploads/final/a+b&c.png"),
            "annotations/uploads/final/a%2Bb%26c.png"
        );
    }
}
