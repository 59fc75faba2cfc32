use std::env;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::Email;
use crate::error::PortalError;

pub const DEFAULT_CONFIG_FILE: &str = "marine-portal.json";
pub const API_KEY_ENV: &str = "MARINE_PORTAL_API_KEY";
pub const DEFAULT_CERTIFICATE_THRESHOLD: usize = 5;
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_MIN_PURPOSE_CHARS: usize = 5;
pub const DEFAULT_CERTIFICATE_FONT_DIR: &str = "fonts";
pub const DEFAULT_CERTIFICATE_FONT_FAMILY: &str = "LiberationSans";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub storage: Option<StorageEntry>,
    #[serde(default)]
    pub certificate_threshold: Option<usize>,
    #[serde(default)]
    pub upload_chunk_size: Option<usize>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub min_purpose_chars: Option<usize>,
    #[serde(default)]
    pub certificate_font_dir: Option<String>,
    #[serde(default)]
    pub certificate_font_family: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageEntry {
    File {
        #[serde(default)]
        path: Option<String>,
    },
    Postgrest {
        url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    File { path: Option<Utf8PathBuf> },
    Postgrest { url: String, api_key: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub storage: StorageConfig,
    pub certificate_threshold: usize,
    pub upload_chunk_size: usize,
    pub admin_email: Option<Email>,
    pub min_purpose_chars: usize,
    pub certificate_font_dir: Utf8PathBuf,
    pub certificate_font_family: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            storage: StorageConfig::File { path: None },
            certificate_threshold: DEFAULT_CERTIFICATE_THRESHOLD,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            admin_email: None,
            min_purpose_chars: DEFAULT_MIN_PURPOSE_CHARS,
            certificate_font_dir: Utf8PathBuf::from(DEFAULT_CERTIFICATE_FONT_DIR),
            certificate_font_family: DEFAULT_CERTIFICATE_FONT_FAMILY.to_string(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PortalError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PortalError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PortalError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PortalError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let storage = match config.storage {
            None => StorageConfig::File { path: None },
            Some(StorageEntry::File { path }) => StorageConfig::File {
                path: path.map(Utf8PathBuf::from),
            },
            Some(StorageEntry::Postgrest { url, api_key }) => {
                let api_key = api_key
                    .or_else(|| env::var(API_KEY_ENV).ok())
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        PortalError::ConfigParse(format!(
                            "postgrest storage needs api_key or {API_KEY_ENV}"
                        ))
                    })?;
                StorageConfig::Postgrest { url, api_key }
            }
            Some(StorageEntry::Memory) => StorageConfig::Memory,
        };

        let upload_chunk_size = config
            .upload_chunk_size
            .unwrap_or(DEFAULT_UPLOAD_CHUNK_SIZE);
        if upload_chunk_size == 0 {
            return Err(PortalError::ConfigParse(
                "upload_chunk_size must be greater than zero".to_string(),
            ));
        }

        let admin_email = config
            .admin_email
            .as_deref()
            .map(str::parse::<Email>)
            .transpose()?;

        Ok(ResolvedConfig {
            schema_version,
            storage,
            certificate_threshold: config
                .certificate_threshold
                .unwrap_or(DEFAULT_CERTIFICATE_THRESHOLD),
            upload_chunk_size,
            admin_email,
            min_purpose_chars: config
                .min_purpose_chars
                .unwrap_or(DEFAULT_MIN_PURPOSE_CHARS),
            certificate_font_dir: Utf8PathBuf::from(
                config
                    .certificate_font_dir
                    .as_deref()
                    .unwrap_or(DEFAULT_CERTIFICATE_FONT_DIR),
            ),
            certificate_font_family: config
                .certificate_font_family
                .unwrap_or_else(|| DEFAULT_CERTIFICATE_FONT_FAMILY.to_string()),
        })
    }
}
