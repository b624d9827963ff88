//! Runtime configuration.
//!
//! Lowest to highest precedence: built-in defaults, `estat.toml` (or the
//! file named by `ESTAT_CONFIG`), `.env`, then the process environment.
//! `.env` never overrides a variable that is already set.

use std::path::{Path, PathBuf};

use estat_api::{ApiConfig, DEFAULT_BASE_URL, is_estat_api_url};
use estat_boundary::DEFAULT_DOWNLOAD_URL;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "estat.toml";
const DEFAULT_CREATED_DIR: &str = "./created/";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A statistics API command was run without an application id.
    #[error("No e-Stat application id configured; set app_id or ESTAT_APP_ID")]
    MissingAppId,

    /// The configuration file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown value types.
    #[error("Invalid config file {path}: {source}")]
    Toml {
        /// Path of the file.
        path: String,
        /// Parse error.
        source: toml::de::Error,
    },
}

/// Shape of `estat.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    app_id: Option<String>,
    api: ApiSection,
    boundary: BoundarySection,
    reference: ReferenceSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSection {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BoundarySection {
    download_url: Option<String>,
    created_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReferenceSection {
    area_codes_path: Option<PathBuf>,
}

/// Resolved configuration, threaded into every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// e-Stat application id.
    pub app_id: Option<String>,
    /// Statistics API base URL.
    pub api_base_url: String,
    /// Boundary download endpoint.
    pub download_url: String,
    /// Directory boundary and merged GeoJSON/CSV outputs are written to.
    pub created_dir: PathBuf,
    /// Full standard area code CSV replacing the bundled subset.
    pub area_codes_path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads `.env`, the config file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly named or present config file
    /// cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Ignoring .env: {e}"),
        }

        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let explicit = env("ESTAT_CONFIG");
        let path = explicit
            .as_deref()
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let text = if explicit.is_some() || path.is_file() {
            Some(read_file(&path)?)
        } else {
            None
        };

        Self::from_sources(text.as_deref().map(|text| (path.as_path(), text)), env)
    }

    /// Layers `file` (path and TOML text) and `env` over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the file text is not valid.
    pub fn from_sources(
        file: Option<(&Path, &str)>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match file {
            Some((path, text)) => toml::from_str(text).map_err(|e| ConfigError::Toml {
                path: path.display().to_string(),
                source: e,
            })?,
            None => FileConfig::default(),
        };

        let config = Self {
            app_id: env("ESTAT_APP_ID").or_else(|| env("app_id")).or(file.app_id),
            api_base_url: env("ESTAT_API_BASE_URL")
                .or(file.api.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            download_url: env("ESTAT_DOWNLOAD_URL")
                .or(file.boundary.download_url)
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL.to_string()),
            created_dir: env("ESTAT_CREATED_DIR")
                .map(PathBuf::from)
                .or(file.boundary.created_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREATED_DIR)),
            area_codes_path: env("ESTAT_AREA_CODES_PATH")
                .map(PathBuf::from)
                .or(file.reference.area_codes_path),
        };

        if !is_estat_api_url(&config.api_base_url) {
            log::warn!(
                "api.base_url {} does not point at the e-Stat API",
                config.api_base_url
            );
        }

        Ok(config)
    }

    /// Application id, required by every statistics API call.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAppId`] if none is configured.
    pub fn app_id(&self) -> Result<&str, ConfigError> {
        self.app_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingAppId)
    }

    /// API client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAppId`] if no application id is set.
    pub fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        Ok(ApiConfig::new(self.app_id()?).with_base_url(self.api_base_url.clone()))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    log::debug!("Reading config from {}", path.display());
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
