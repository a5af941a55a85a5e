//! Per-install device identity.
//!
//! The agreement service keys views and decisions by device. When the host
//! does not supply an identifier, one is generated once and persisted so it
//! survives restarts. If persistence is unavailable the provider degrades to
//! an identifier that lives only as long as the process.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Source of the device identifier sent with every request.
pub trait DeviceIdentity: Send + Sync {
    /// Return the identifier, creating it on first use.
    fn get_or_create(&self) -> String;
}

/// Identity persistence errors. Never fatal: the store falls back to an
/// ephemeral identifier.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("could not determine a data directory")]
    NoDataDir,

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt identity file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIdentity {
    device_id: String,
    created_at: DateTime<Utc>,
}

/// Device identity persisted as JSON in a file.
#[derive(Debug)]
pub struct FileIdentityStore {
    path: Option<PathBuf>,
    cached: Mutex<Option<String>>,
}

impl FileIdentityStore {
    /// Store at the platform local data directory.
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
            cached: Mutex::new(None),
        }
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cached: Mutex::new(None),
        }
    }

    /// `<local data dir>/agreement-kit/device.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("agreement-kit").join("device.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the persisted identifier or create and persist a new one.
    ///
    /// An unreadable identity file is replaced with a fresh identifier.
    pub fn load_or_create(&self) -> Result<String, IdentityError> {
        let path = self.path.as_ref().ok_or(IdentityError::NoDataDir)?;

        if path.exists() {
            match read_identity(path) {
                Ok(persisted) => return Ok(persisted.device_id),
                Err(e @ IdentityError::Corrupt { .. }) => {
                    warn!(error = %e, "Replacing corrupt device identity file");
                }
                Err(e) => return Err(e),
            }
        }

        let persisted = PersistedIdentity {
            device_id: generate_id(),
            created_at: Utc::now(),
        };
        write_identity(path, &persisted)?;

        debug!(path = ?path, "Generated device identifier");
        Ok(persisted.device_id)
    }
}

fn read_identity(path: &Path) -> Result<PersistedIdentity, IdentityError> {
    let content = std::fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&content).map_err(|source| IdentityError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file and rename it over `path`, so a crash never
/// leaves a truncated identity behind.
fn write_identity(path: &Path, persisted: &PersistedIdentity) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let json = serde_json::to_string_pretty(persisted).map_err(|source| {
        IdentityError::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IdentityError {
    let path = path.to_path_buf();
    move |source| IdentityError::Io { path, source }
}

impl Default for FileIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceIdentity for FileIdentityStore {
    fn get_or_create(&self) -> String {
        let mut cached = self.cached.lock();
        if let Some(ref id) = *cached {
            return id.clone();
        }

        let id = match self.load_or_create() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Device identity not persisted, using ephemeral identifier");
                generate_id()
            }
        };
        *cached = Some(id.clone());
        id
    }
}

/// Identity supplied by the host.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub String);

impl DeviceIdentity for FixedIdentity {
    fn get_or_create(&self) -> String {
        self.0.clone()
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
