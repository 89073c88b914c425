//! Manifest discovery and loading from disk.
//!
//! Resolution order: explicit path → environment variables → XDG config →
//! system config → built-in manifest.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::manifest;
use crate::patch_cnn;
use crate::tree::ConfigTree;

/// Where the manifest came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ManifestSource {
    /// Explicitly provided by the caller.
    Explicit,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/patch-cnn/.
    SystemConfig,

    /// Using the manifest compiled into the crate.
    #[default]
    Builtin,
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestSource::Explicit => write!(f, "explicit path"),
            ManifestSource::Environment => write!(f, "environment variable"),
            ManifestSource::XdgConfig => write!(f, "XDG config"),
            ManifestSource::SystemConfig => write!(f, "system config"),
            ManifestSource::Builtin => write!(f, "builtin manifest"),
        }
    }
}

/// Environment variable naming the manifest file directly.
pub const ENV_SETTINGS_PATH: &str = "PATCH_CNN_SETTINGS";
/// Environment variable naming a directory holding the manifest.
pub const ENV_CONFIG_DIR: &str = "PATCH_CNN_CONFIG_DIR";

/// Standard manifest file name.
pub const MANIFEST_FILENAME: &str = "patch_cnn.yaml";

/// Application name for XDG directories.
const APP_NAME: &str = "patch-cnn";

/// Result of manifest discovery.
#[derive(Debug, Clone, Default)]
pub struct ManifestLocation {
    /// Path to the manifest file (None for the built-in manifest).
    pub path: Option<PathBuf>,
    pub source: ManifestSource,
}

/// Locate the manifest file.
///
/// 1. Explicit path (if it exists)
/// 2. PATCH_CNN_SETTINGS
/// 3. PATCH_CNN_CONFIG_DIR + patch_cnn.yaml
/// 4. XDG config directory (~/.config/patch-cnn/)
/// 5. System config (/etc/patch-cnn/)
/// 6. Built-in manifest (None)
pub fn discover_manifest(explicit: Option<&Path>) -> ManifestLocation {
    let found = |path: PathBuf, source: ManifestSource| {
        debug!(path = %path.display(), %source, "manifest candidate found");
        ManifestLocation {
            path: Some(path),
            source,
        }
    };

    if let Some(path) = explicit {
        if is_candidate(path) {
            return found(path.to_path_buf(), ManifestSource::Explicit);
        }
    }

    if let Ok(env_path) = std::env::var(ENV_SETTINGS_PATH) {
        let path = PathBuf::from(env_path);
        if is_candidate(&path) {
            return found(path, ManifestSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(MANIFEST_FILENAME);
        if is_candidate(&path) {
            return found(path, ManifestSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(MANIFEST_FILENAME);
        if is_candidate(&path) {
            return found(path, ManifestSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(MANIFEST_FILENAME);
    if is_candidate(&system_path) {
        return found(system_path, ManifestSource::SystemConfig);
    }

    ManifestLocation::default()
}

/// A candidate counts only if it is a regular file. Anything else present at
/// the path is skipped with a warning.
fn is_candidate(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => true,
        Ok(_) => {
            warn!(path = %path.display(), "manifest candidate is not a file, skipping");
            false
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "manifest candidate is unreadable, skipping");
            false
        }
    }
}

/// Get the XDG config directory for patch-cnn.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

/// A loaded manifest with provenance.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub tree: ConfigTree,
    pub location: ManifestLocation,
    /// Raw manifest text, kept for snapshot hashing.
    pub raw: String,
}

/// Read and validate a manifest file.
pub fn load_file(path: &Path) -> ConfigResult<(ConfigTree, String)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let tree = manifest::load(&content)?;
    Ok((tree, content))
}

/// Discover, read and validate the manifest.
pub fn load_discovered(explicit: Option<&Path>) -> ConfigResult<LoadedManifest> {
    let location = discover_manifest(explicit);
    let (tree, raw) = match &location.path {
        Some(path) => load_file(path)?,
        None => (patch_cnn::default_tree()?, patch_cnn::manifest().to_string()),
    };
    info!(
        source = %location.source,
        path = ?location.path,
        settings = tree.leaves().len(),
        "settings manifest loaded"
    );
    Ok(LoadedManifest {
        tree,
        location,
        raw,
    })
}
