//! Bundle directory lifecycle and manifest.
//!
//! A run writes into `{output_dir}/{bundle}/.{timestamp}.staging/` and
//! [`BundleDir::commit`] renames that directory to `{timestamp}/` once every
//! table is in place. A staging directory that is dropped without a commit is
//! deleted, so a failed run leaves no bundle behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest layout version. Newer versions are rejected on load.
pub const MANIFEST_VERSION: u32 = 1;

/// Directory name for an ingestion timestamp (no `:` so it is a valid path
/// everywhere).
pub fn ingestion_dirname(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H;%M;%S%.6f").to_string()
}

#[derive(Debug)]
pub struct BundleDir {
    staging: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl BundleDir {
    /// Create a fresh staging directory for `bundle` under `output_dir`.
    pub fn create(output_dir: &Path, bundle: &str, timestamp: DateTime<Utc>) -> io::Result<Self> {
        let root = output_dir.join(bundle);
        let name = ingestion_dirname(timestamp);
        let target = root.join(&name);
        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("bundle {} already exists", target.display()),
            ));
        }
        let staging = root.join(format!(".{name}.staging"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        Ok(Self {
            staging,
            target,
            committed: false,
        })
    }

    /// Where writers put their files until commit.
    pub fn staging(&self) -> &Path {
        &self.staging
    }

    /// Final location after commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Write the manifest and move the staging directory into place.
    pub fn commit(mut self, manifest: &BundleManifest) -> io::Result<PathBuf> {
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.staging.join(MANIFEST_FILE), json)?;
        fs::rename(&self.staging, &self.target)?;
        self.committed = true;
        info!(path = %self.target.display(), "committed bundle");
        Ok(self.target.clone())
    }
}

impl Drop for BundleDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.staging.display(), error = %e, "failed to remove staging dir");
            }
        }
    }
}

/// Record of one committed ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: u32,
    pub bundle: String,
    pub calendar: String,
    pub exchange: String,
    pub created_at: DateTime<Utc>,
    pub symbols: usize,
    pub sessions: usize,
    pub splits: usize,
    pub dividends: usize,
    /// BLAKE3 hex digest per file, keyed by `/`-separated path relative to
    /// the bundle root.
    pub files: BTreeMap<String, String>,
}

impl BundleManifest {
    pub fn load(bundle_path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(bundle_path.join(MANIFEST_FILE))?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "unsupported manifest version {} (max supported: {MANIFEST_VERSION})",
                    manifest.version
                ),
            ));
        }
        Ok(manifest)
    }

    /// Files under `bundle_path` whose contents no longer match their hash.
    pub fn verify(&self, bundle_path: &Path) -> io::Result<Vec<String>> {
        let mut mismatched = Vec::new();
        for (rel, expected) in &self.files {
            let path = bundle_path.join(rel);
            let actual = match fs::read(&path) {
                Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e),
            };
            if &actual != expected {
                mismatched.push(rel.clone());
            }
        }
        Ok(mismatched)
    }
}

/// BLAKE3 digest of every file below `root`, manifest excluded.
pub fn hash_files(root: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key == MANIFEST_FILE {
                continue;
            }
            let digest = blake3::hash(&fs::read(&path)?);
            out.insert(key, digest.to_hex().to_string());
        }
    }
    Ok(out)
}
