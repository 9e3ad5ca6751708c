//! On-disk state store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/state/defs.yaml          cluster definitions, global defaults
//! <root>/state/manifests/**.yaml  one file per manifest, path mirroring
//!                                 the repository URL
//! <root>/version                  monotonic write counter
//! <root>/audit.log                append-only record of who wrote what
//! ```
//!
//! Writes replace the whole `state/` tree: the new tree is staged in a
//! temporary directory next to it and swapped in by rename, so a reader
//! never observes a half-written state. The version counter backs the
//! optimistic-concurrency check.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use walkdir::WalkDir;

use drover_core::{Defs, Manifest, ManifestId, Manifests, State, User};

use crate::error::{Result, StoreError};
use crate::manager::StateManager;

pub struct DiskStateManager {
    root: PathBuf,
    /// Version observed by this manager's last read; writes conflict when
    /// the store has moved past it.
    last_read: Mutex<u64>,
}

impl DiskStateManager {
    /// Open a store rooted at `root`. No I/O happens until the first read.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_read: Mutex::new(0),
        }
    }

    /// Seed an empty store at `root`.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        if root.join("version").exists() {
            return Err(StoreError::AlreadyInitialized {
                path: root.display().to_string(),
            });
        }
        let state = root.join("state");
        fs::create_dir_all(state.join("manifests"))?;
        fs::write(state.join("defs.yaml"), Defs::default().to_yaml()?)?;
        fs::write(root.join("version"), "0\n")?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    fn read_version(&self) -> Result<u64> {
        let path = self.root.join("version");
        if !path.exists() {
            return Err(StoreError::NotInitialized {
                path: self.root.display().to_string(),
            });
        }
        let text = fs::read_to_string(&path)?;
        text.trim()
            .parse()
            .map_err(|_| StoreError::Storage(format!("corrupt version file: {text:?}")))
    }

    fn write_version(&self, version: u64) -> Result<()> {
        let mut file = tempfile::NamedTempFile::new_in(&self.root)?;
        writeln!(file, "{version}")?;
        file.persist(self.root.join("version"))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn append_audit(&self, version: u64, user: &User) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join("audit.log"))?;
        writeln!(file, "{}  v{}  {}", Utc::now().to_rfc3339(), version, user)?;
        Ok(())
    }
}

/// Where a manifest lives below `state/manifests/`: the id string with its
/// repository path as directories. The id is re-derived from file content
/// on read, so the path is purely an address.
fn manifest_rel_path(id: &ManifestId) -> PathBuf {
    let s = id.to_string();
    match s.rsplit_once('/') {
        Some((dirs, file)) => PathBuf::from(dirs).join(format!("{file}.yaml")),
        None => PathBuf::from(format!("{s}.yaml")),
    }
}

#[async_trait]
impl StateManager for DiskStateManager {
    async fn read_state(&self) -> Result<State> {
        let version = self.read_version()?;

        let defs = Defs::from_yaml(&fs::read_to_string(self.state_dir().join("defs.yaml"))?)?;

        let mut manifests = Manifests::new();
        let dir = self.state_dir().join("manifests");
        if dir.exists() {
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = entry.map_err(|e| StoreError::Storage(e.to_string()))?;
                let path = entry.path();
                let is_yaml = path
                    .extension()
                    .map(|e| e == "yaml" || e == "yml")
                    .unwrap_or(false);
                if entry.file_type().is_file() && is_yaml {
                    manifests.add(Manifest::from_yaml(&fs::read_to_string(path)?)?)?;
                }
            }
        }

        *self.last_read.lock().unwrap() = version;
        debug!(version, manifests = manifests.len(), "read state");
        Ok(State { defs, manifests })
    }

    async fn write_state(&self, state: &State, user: &User) -> Result<()> {
        state.validate()?;

        let mut last_read = self.last_read.lock().unwrap();
        let current = self.read_version()?;
        if current != *last_read {
            return Err(StoreError::ConcurrentUpdate {
                read: *last_read,
                store: current,
            });
        }

        // Stage the replacement tree next to the live one.
        let staged = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?
            .keep();
        fs::write(staged.join("defs.yaml"), state.defs.to_yaml()?)?;
        let manifests_dir = staged.join("manifests");
        fs::create_dir_all(&manifests_dir)?;
        for (id, manifest) in state.manifests.iter() {
            let path = manifests_dir.join(manifest_rel_path(id));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, manifest.to_yaml()?)?;
        }

        // Swap it in.
        let live = self.state_dir();
        let retired = self.root.join(".previous");
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        if live.exists() {
            fs::rename(&live, &retired)?;
        }
        fs::rename(&staged, &live)?;
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }

        let next = current + 1;
        self.write_version(next)?;
        self.append_audit(next, user)?;
        *last_read = next;
        debug!(version = next, user = %user, "wrote state");
        Ok(())
    }
}
