use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { root: PathBuf },
    S3(S3Settings),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub cors_origin: Option<String>,
    pub storage: StorageConfig,
    pub annotation_tool: String,
    pub annotation_lang: String,
    pub max_upload_bytes: usize,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;

        let storage = match optional("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                root: PathBuf::from(optional("UPLOAD_ROOT").unwrap_or_else(|| "uploads".to_string())),
            },
            "s3" => StorageConfig::S3(S3Settings {
                bucket_name: required("S3_BUCKET_NAME")?,
                region: required("AWS_REGION")?,
                access_key_id: required("AWS_ACCESS_KEY_ID")?,
                secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
                endpoint: optional("S3_ENDPOINT"),
                prefix: optional("S3_PREFIX").unwrap_or_else(|| "uploads".to_string()),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let max_upload_bytes = match optional("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "MAX_UPLOAD_BYTES",
                value: raw,
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            cors_origin: optional("CORS_ORIGIN"),
            storage,
            annotation_tool: optional("ANNOTATION_TOOL_NAME")
                .unwrap_or_else(|| "Khmer Data Annotation Tool".to_string()),
            annotation_lang: optional("ANNOTATION_LANG").unwrap_or_else(|| "khm".to_string()),
            max_upload_bytes,
        })
    }

    /// Root directory served under `/uploads` when artifacts live on disk.
    pub fn local_upload_root(&self) -> Option<&PathBuf> {
        match &self.storage {
            StorageConfig::Local { root } => Some(root),
            StorageConfig::S3(_) => None,
        }
    }
}
