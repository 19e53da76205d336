use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::utils::sanitize_file_name;

const WORKING_DIR: &str = "temp";
const FINAL_DIR: &str = "final";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("artifact already exists: {0}")]
    AlreadyExists(String),
    #[error("storage i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("object storage error: {0}")]
    Remote(String),
}

impl StorageError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        let display = path.display().to_string();
        match source.kind() {
            ErrorKind::NotFound => StorageError::NotFound(display),
            ErrorKind::PermissionDenied => StorageError::PermissionDenied(display),
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(display),
            _ => StorageError::Io { path: display, source },
        }
    }
}

/// Where image bytes live while an image is pending and once it is final.
///
/// Paths handed out by `put` and `relocate` are opaque to callers; they are
/// stored on the image record and passed back in verbatim.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `data` into the working area. Never overwrites an existing
    /// artifact: the stored name embeds a uniqueness token.
    async fn put(&self, data: &[u8], suggested_name: &str) -> Result<String, StorageError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Move an artifact into the final area, keeping its base name.
    async fn relocate(&self, path: &str) -> Result<String, StorageError>;

    /// Undo a `relocate`: move the artifact at `current` back to `original`.
    async fn restore(&self, current: &str, original: &str) -> Result<(), StorageError>;
}

/// `{unix-nanos}_{token}_{name}`; the token keeps two same-named files that
/// land in the same clock tick apart.
pub fn unique_artifact_name(suggested_name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let token = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", nanos, &token[..8], sanitize_file_name(suggested_name))
}

/// Filesystem store rooted at `root`, with `root/temp` as the working area
/// and `root/final` as the final area.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    working_dir: PathBuf,
    final_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            working_dir: root.join(WORKING_DIR),
            final_dir: root.join(FINAL_DIR),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn final_dir(&self) -> &Path {
        &self.final_dir
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, data: &[u8], suggested_name: &str) -> Result<String, StorageError> {
        fs::create_dir_all(&self.working_dir)
            .await
            .map_err(|e| StorageError::from_io(&self.working_dir, e))?;

        let path = self.working_dir.join(unique_artifact_name(suggested_name));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::from_io(&path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| StorageError::from_io(&path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::from_io(&path, e))?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let path = Path::new(path);
        fs::read(path).await.map_err(|e| StorageError::from_io(path, e))
    }

    async fn relocate(&self, path: &str) -> Result<String, StorageError> {
        let source = PathBuf::from(path);
        let base_name = source
            .file_name()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let target = self.final_dir.join(base_name);

        if source == target {
            // Already finalized once; make sure it is still there.
            fs::metadata(&target)
                .await
                .map_err(|e| StorageError::from_io(&target, e))?;
            return Ok(target.to_string_lossy().into_owned());
        }

        move_file(&source, &target).await?;

        Ok(target.to_string_lossy().into_owned())
    }

    async fn restore(&self, current: &str, original: &str) -> Result<(), StorageError> {
        if current == original {
            return Ok(());
        }
        move_file(Path::new(current), Path::new(original)).await
    }
}

/// Move `source` to `target`, creating the target directory as needed.
async fn move_file(source: &Path, target: &Path) -> Result<(), StorageError> {
    fs::metadata(source)
        .await
        .map_err(|e| StorageError::from_io(source, e))?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::from_io(parent, e))?;
    }

    if let Err(e) = fs::rename(source, target).await {
        if e.kind() == ErrorKind::NotFound || e.kind() == ErrorKind::PermissionDenied {
            return Err(StorageError::from_io(source, e));
        }
        // Working and final areas may sit on different devices.
        tracing::warn!(error = %e, source = %source.display(), "rename failed, falling back to copy");
        fs::copy(source, target)
            .await
            .map_err(|e| StorageError::from_io(target, e))?;
        fs::remove_file(source)
            .await
            .map_err(|e| StorageError::from_io(source, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_never_reuses_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let first = store.put(b"one", "cat.jpg").await.unwrap();
        let second = store.put(b"two", "cat.jpg").await.unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with("_cat.jpg"));
        assert!(Path::new(&first).starts_with(store.working_dir()));
        assert_eq!(store.read(&first).await.unwrap(), b"one");
        assert_eq!(store.read(&second).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn put_keeps_hostile_names_inside_the_working_area() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let path = store.put(b"x", "../../escape.png").await.unwrap();
        assert!(Path::new(&path).starts_with(store.working_dir()));
        assert!(path.ends_with("_escape.png"));
    }

    #[tokio::test]
    async fn relocate_moves_into_final_area() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let working = store.put(b"pixels", "dog.png").await.unwrap();
        let finalized = store.relocate(&working).await.unwrap();

        assert!(Path::new(&finalized).starts_with(store.final_dir()));
        assert_eq!(
            Path::new(&finalized).file_name(),
            Path::new(&working).file_name()
        );
        assert!(!Path::new(&working).exists());
        assert_eq!(store.read(&finalized).await.unwrap(), b"pixels");

        // A second relocation of a final artifact is a no-op.
        let again = store.relocate(&finalized).await.unwrap();
        assert_eq!(again, finalized);
    }

    #[tokio::test]
    async fn restore_puts_a_relocated_artifact_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let working = store.put(b"pixels", "dog.png").await.unwrap();
        let finalized = store.relocate(&working).await.unwrap();
        store.restore(&finalized, &working).await.unwrap();

        assert!(!Path::new(&finalized).exists());
        assert_eq!(store.read(&working).await.unwrap(), b"pixels");

        // Restoring onto itself leaves the artifact alone.
        store.restore(&working, &working).await.unwrap();
        assert!(Path::new(&working).exists());
    }

    #[tokio::test]
    async fn missing_artifacts_report_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let ghost = store.working_dir().join("ghost.jpg");
        let ghost = ghost.to_str().unwrap();

        assert!(matches!(store.read(ghost).await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.relocate(ghost).await, Err(StorageError::NotFound(_))));
        assert!(!store.final_dir().join("ghost.jpg").exists());
    }
}
