//! JSON-file collaborators.
//!
//! Drafts are stored one file per (source, tab) under a directory per
//! source; committed mappings one file per source. Ids are hex-encoded in
//! file names so distinct ids never share a file. Writes go to a temp file
//! first and are renamed into place so a crash never leaves a half-written
//! draft behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabmap_map::CommitRequest;
use tabmap_model::{DraftState, SavedTabMapping};

use super::{CommitEndpoint, LocalDraftCache, RemoteDraftStore, SavedMappingStore};
use crate::error::{Result, SessionError};

/// Directory of draft files. Serves as local cache or as remote store.
#[derive(Debug, Clone)]
pub struct JsonDraftDir {
    base_dir: PathBuf,
}

impl JsonDraftDir {
    /// Opens the directory, creating it if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .map_err(|e| SessionError::io("create directory", &base_dir, e))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn draft_path(&self, source_id: &str, tab: &str) -> PathBuf {
        self.base_dir
            .join(file_id(source_id))
            .join(format!("{}.draft.json", file_id(tab)))
    }
}

impl LocalDraftCache for JsonDraftDir {
    fn read(&self, source_id: &str, tab: &str) -> Result<Option<DraftState>> {
        read_json(&self.draft_path(source_id, tab), "draft")
    }

    fn write(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()> {
        write_json_atomic(&self.draft_path(source_id, tab), draft, "draft")
    }

    fn remove(&self, source_id: &str, tab: &str) -> Result<()> {
        remove_if_exists(&self.draft_path(source_id, tab))
    }
}

impl RemoteDraftStore for JsonDraftDir {
    async fn get(&self, source_id: &str, tab: &str) -> Result<Option<DraftState>> {
        let path = self.draft_path(source_id, tab);
        blocking(move || read_json(&path, "draft")).await
    }

    async fn put(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()> {
        let path = self.draft_path(source_id, tab);
        let draft = draft.clone();
        blocking(move || write_json_atomic(&path, &draft, "draft")).await
    }

    async fn delete(&self, source_id: &str, tab: &str) -> Result<()> {
        let path = self.draft_path(source_id, tab);
        blocking(move || remove_if_exists(&path)).await
    }
}

/// A committed tab mapping with repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTabMapping {
    #[serde(flatten)]
    pub mapping: SavedTabMapping,
    /// RFC 3339 time of the commit.
    pub saved_at: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl StoredTabMapping {
    pub fn new(mapping: SavedTabMapping) -> Self {
        Self {
            mapping,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            version: default_version(),
        }
    }
}

/// Repository of committed mappings, one JSON file per source.
#[derive(Debug, Clone)]
pub struct JsonMappingRepository {
    base_dir: PathBuf,
}

impl JsonMappingRepository {
    /// Opens the repository, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .map_err(|e| SessionError::io("create directory", &base_dir, e))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn source_path(&self, source_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.mappings.json", file_id(source_id)))
    }

    /// Tab entries exactly as stored.
    fn load_raw(&self, source_id: &str) -> Result<Vec<Value>> {
        Ok(read_json(&self.source_path(source_id), "saved mapping")?.unwrap_or_default())
    }

    /// All committed tabs of a source; empty when nothing was committed.
    ///
    /// Tab entries that cannot be read are logged and left out, so one
    /// damaged tab does not hide the others.
    pub fn load(&self, source_id: &str) -> Result<Vec<StoredTabMapping>> {
        let entries = self
            .load_raw(source_id)?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<StoredTabMapping>(entry) {
                Ok(stored) => Some(stored),
                Err(error) => {
                    tracing::warn!(source_id, %error, "skipping unreadable saved tab");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    /// Stores `mapping`, replacing an earlier commit of the same tab.
    /// Other tabs are written back untouched.
    pub fn save_tab(&self, source_id: &str, mapping: SavedTabMapping) -> Result<PathBuf> {
        let path = self.source_path(source_id);
        let tab = mapping.tab.clone();
        let mut stored = self.load_raw(source_id)?;
        stored.retain(|entry| entry_tab(entry) != Some(tab.as_str()));
        let entry = serde_json::to_value(StoredTabMapping::new(mapping)).map_err(|source| {
            SessionError::Serialization {
                what: "saved mapping",
                source,
            }
        })?;
        stored.push(entry);
        stored.sort_by(|a, b| entry_tab(a).cmp(&entry_tab(b)));
        write_json_atomic(&path, &stored, "saved mapping")?;
        tracing::info!(path = %path.display(), %tab, "saved tab mapping");
        Ok(path)
    }

    /// Removes the commit of one tab. Returns false if there was none.
    pub fn delete_tab(&self, source_id: &str, tab: &str) -> Result<bool> {
        let mut stored = self.load_raw(source_id)?;
        let before = stored.len();
        stored.retain(|entry| entry_tab(entry) != Some(tab));
        if stored.len() == before {
            return Ok(false);
        }
        write_json_atomic(&self.source_path(source_id), &stored, "saved mapping")?;
        Ok(true)
    }
}

impl SavedMappingStore for JsonMappingRepository {
    async fn get(&self, source_id: &str) -> Result<Vec<SavedTabMapping>> {
        let repository = self.clone();
        let source_id = source_id.to_string();
        let stored = blocking(move || repository.load(&source_id)).await?;
        Ok(stored.into_iter().map(|entry| entry.mapping).collect())
    }
}

impl CommitEndpoint for JsonMappingRepository {
    async fn commit(&self, source_id: &str, tab: &str, request: &CommitRequest) -> Result<()> {
        let repository = self.clone();
        let source_id = source_id.to_string();
        let mapping = request.clone().into_saved(tab);
        blocking(move || repository.save_tab(&source_id, mapping).map(|_| ())).await
    }
}

/// Runs blocking file I/O off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SessionError::remote("file task", e.to_string()))?
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SessionError::io("read", path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| SessionError::Serialization { what, source })
}

fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| SessionError::Serialization { what, source })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SessionError::io("create directory", parent, e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path).map_err(|e| SessionError::io("create", &temp_path, e))?;
    file.write_all(&bytes)
        .map_err(|e| SessionError::io("write", &temp_path, e))?;
    file.sync_all()
        .map_err(|e| SessionError::io("sync", &temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| SessionError::io("rename", path, e))?;
    tracing::trace!(path = %path.display(), "wrote {what}");
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::io("delete", path, e)),
    }
}

/// File-name form of an id. Hex keeps distinct ids apart and is safe on
/// every file system.
fn file_id(id: &str) -> String {
    hex::encode(id.as_bytes())
}

fn entry_tab(entry: &Value) -> Option<&str> {
    entry.get("tab").and_then(Value::as_str)
}
