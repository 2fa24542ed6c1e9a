//! Manifest parser for loading application manifests.
//!
//! This module handles loading `halldyll.app.yaml` and applying
//! environment variable overrides, with proper precedence and error
//! handling.

use crate::error::{ManifestError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{AppService, DOMAIN_PARAM, TCP_ADDRESS_PARAM};

/// Default manifest file names to search for.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &[
    "halldyll.app.yaml",
    "halldyll.app.yml",
    "app.yaml",
    "app.yml",
];

/// Parser for application manifests.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ManifestParser {
    /// Creates a new manifest parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AppService> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(ManifestError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a manifest from a YAML string.
    ///
    /// Resources without a namespace are placed in the tenant namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AppService> {
        debug!("Parsing YAML manifest");

        let mut app: AppService = serde_yaml::from_str(content).map_err(|e| {
            ManifestError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            }
        })?;
        app.normalize();

        debug!(
            "Parsed manifest for {}/{} with {} resources",
            app.tenant_id,
            app.service_id,
            app.resource_count()
        );
        Ok(app)
    }

    /// Loads a manifest with environment variable overrides.
    ///
    /// Recognised variables: `HALLDYLL_TENANT_ID`, `HALLDYLL_SERVICE_ID`,
    /// `HALLDYLL_DOMAIN` and `HALLDYLL_TCP_ADDRESS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<AppService> {
        let mut app = self.load_file(path)?;
        Self::apply_env_overrides(&mut app);
        app.normalize();
        Ok(app)
    }

    /// Applies environment variable overrides to the manifest.
    fn apply_env_overrides(app: &mut AppService) {
        if let Ok(tenant) = std::env::var("HALLDYLL_TENANT_ID") {
            debug!("Overriding tenant_id from environment");
            app.tenant_id = tenant;
        }

        if let Ok(service) = std::env::var("HALLDYLL_SERVICE_ID") {
            debug!("Overriding service_id from environment");
            app.service_id = service;
        }

        if let Ok(domain) = std::env::var("HALLDYLL_DOMAIN") {
            debug!("Narrowing apply to domain {domain} from environment");
            app.custom_params.insert(DOMAIN_PARAM.to_string(), domain);
        }

        if let Ok(address) = std::env::var("HALLDYLL_TCP_ADDRESS") {
            debug!("Narrowing apply to TCP address {address} from environment");
            app.custom_params.insert(TCP_ADDRESS_PARAM.to_string(), address);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ManifestError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds the manifest file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no manifest file is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let manifest_path = current.join(filename);
            if manifest_path.exists() {
                info!("Found manifest file: {}", manifest_path.display());
                return Ok(manifest_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ManifestError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }
    .into())
}
