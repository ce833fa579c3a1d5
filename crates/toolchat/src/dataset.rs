//! The tool catalog: a JSON document `{"tools": [ {...}, ... ]}`.
//!
//! Records are free-form objects. Nothing about their fields is validated
//! here; the context renderer reads a fixed allowlist of keys and shows a
//! placeholder for anything missing.
//!
//! [`DatasetStore`] owns the current catalog. Loading is infallible: a
//! missing, unreadable or malformed file leaves the process running with an
//! empty catalog. Replacement validates the incoming document, writes it
//! through a temp file plus rename, and only then swaps the in-memory
//! snapshot, so readers see either the old or the new catalog in full.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

/// One catalog entry: field name to scalar value.
pub type ToolRecord = serde_json::Map<String, Value>;

/// Why a document can't be adopted as the catalog.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid dataset: {0}")]
    InvalidShape(String),
    #[error("dataset I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An ordered list of tool records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub tools: Vec<ToolRecord>,
    /// Assigned by [`DatasetStore`] on adoption; `0` means unversioned.
    version: u64,
}

impl Dataset {
    pub fn new(tools: Vec<ToolRecord>) -> Self {
        Self { tools, version: 0 }
    }

    /// Validate a JSON document and extract its records.
    ///
    /// The document must be an object. A missing `tools` key means an empty
    /// catalog; a present one must be an array of objects.
    pub fn from_value(value: Value) -> Result<Self, DatasetError> {
        let Value::Object(mut root) = value else {
            return Err(DatasetError::InvalidShape(
                "dataset must be a JSON object".into(),
            ));
        };
        let tools = match root.remove("tools") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(record) => Ok(record),
                    _ => Err(DatasetError::InvalidShape(format!(
                        "tool record {i} is not an object"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(DatasetError::InvalidShape(
                    "dataset must contain a 'tools' array".into(),
                ));
            }
        };
        Ok(Self::new(tools))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Read the catalog at `path`, degrading to an empty catalog on any failure.
pub fn load(path: &Path) -> Dataset {
    info!("Loading dataset from: {}", path.display());
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!("Dataset file not readable at {}: {e}", path.display());
            return Dataset::default();
        }
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            error!("Error decoding JSON from dataset file {}: {e}", path.display());
            return Dataset::default();
        }
    };
    match Dataset::from_value(value) {
        Ok(dataset) => {
            info!("Loaded {} tools", dataset.len());
            dataset
        }
        Err(e) => {
            error!("Error loading dataset: {e}");
            Dataset::default()
        }
    }
}

/// Write `document` to `path` via a synced sibling temp file and an atomic
/// rename. The whole document is kept, including keys other than `tools`.
fn persist(path: &Path, document: &Value) -> Result<(), DatasetError> {
    let json = serde_json::to_string_pretty(document)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let written = fs::File::create(&tmp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Owner of the current catalog and its backing file.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    current: RwLock<Arc<Dataset>>,
    updated_at: RwLock<DateTime<Utc>>,
    next_version: AtomicU64,
    /// Serializes writers so two replacements never share the temp file.
    write_lock: Mutex<()>,
}

impl DatasetStore {
    /// Load the catalog at `path` and take ownership of the file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dataset = load(&path);
        Self::with_dataset(path, dataset)
    }

    /// Start from an in-memory catalog; `path` is only used by [`replace`](Self::replace).
    pub fn with_dataset(path: impl Into<PathBuf>, mut dataset: Dataset) -> Self {
        dataset.version = 1;
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(dataset)),
            updated_at: RwLock::new(Utc::now()),
            next_version: AtomicU64::new(2),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current catalog. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Dataset> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// When the current catalog was adopted.
    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate, persist and adopt `value`. Returns whether it was adopted.
    ///
    /// On failure the in-memory catalog and the file on disk are unchanged.
    pub fn replace(&self, value: Value) -> bool {
        match self.try_replace(value) {
            Ok(dataset) => {
                info!(
                    "Dataset updated successfully ({} tools, version {})",
                    dataset.len(),
                    dataset.version()
                );
                true
            }
            Err(e) => {
                error!("Error updating dataset: {e}");
                false
            }
        }
    }

    /// [`replace`](Self::replace) with the failure reason.
    pub fn try_replace(&self, value: Value) -> Result<Arc<Dataset>, DatasetError> {
        let mut dataset = Dataset::from_value(value.clone())?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        persist(&self.path, &value)?;

        dataset.version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let dataset = Arc::new(dataset);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = dataset.clone();
        *self.updated_at.write().unwrap_or_else(|e| e.into_inner()) = Utc::now();
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_reads_tools_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "tools.json",
            r#"{"tools": [{"TLMS_TOOL_ID": "T-1"}, {"TLMS_TOOL_ID": "T-2", "TLMS_CHILD_PART_QTY": 4}]}"#,
        );

        let dataset = load(&path);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.tools[0]["TLMS_TOOL_ID"], "T-1");
        assert_eq!(dataset.tools[1]["TLMS_CHILD_PART_QTY"], 4);
    }

    #[test]
    fn load_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("malformed.json", "{\"tools\": ["),
            ("not_a_list.json", r#"{"tools": {"TLMS_TOOL_ID": "T-1"}}"#),
            ("scalar_records.json", r#"{"tools": [1, 2]}"#),
            ("array_root.json", r#"[{"TLMS_TOOL_ID": "T-1"}]"#),
            ("no_tools_key.json", r#"{"records": []}"#),
        ];
        for (name, content) in cases {
            let path = write(&dir, name, content);
            assert!(load(&path).is_empty(), "{name} should load as empty");
        }
        assert!(load(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn store_versions_start_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("missing.json"));
        let dataset = store.snapshot();
        assert!(dataset.is_empty());
        assert_eq!(dataset.version(), 1);
    }

    #[test]
    fn replace_persists_and_adopts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tools.json");
        let store = DatasetStore::open(&path);

        assert!(store.replace(json!({"tools": [{"TLMS_TOOL_ID": "T-9"}]})));

        let current = store.snapshot();
        assert_eq!(current.len(), 1);
        assert_eq!(current.version(), 2);
        assert!(!dir.path().join("data").join("tools.json.tmp").exists());

        let reloaded = load(&path);
        assert_eq!(reloaded.tools[0]["TLMS_TOOL_ID"], "T-9");
    }

    #[test]
    fn replace_keeps_other_top_level_keys_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        let store = DatasetStore::open(&path);

        let document = json!({
            "exported_at": "2024-03-01",
            "source": "TLMS",
            "tools": [{"TLMS_TOOL_ID": "T-3"}],
        });
        assert!(store.replace(document.clone()));

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, document);
        assert_eq!(store.snapshot().tools[0]["TLMS_TOOL_ID"], "T-3");
    }

    #[test]
    fn replace_rejects_non_list_and_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "tools.json", r#"{"tools": [{"TLMS_TOOL_ID": "T-1"}]}"#);
        let store = DatasetStore::open(&path);
        let before = fs::read_to_string(&path).unwrap();

        assert!(!store.replace(json!({"tools": "everything"})));
        assert!(!store.replace(json!(["not", "an", "object"])));

        let current = store.snapshot();
        assert_eq!(current.len(), 1);
        assert_eq!(current.tools[0]["TLMS_TOOL_ID"], "T-1");
        assert_eq!(current.version(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn failed_write_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is a directory, so the rename cannot succeed.
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        let store = DatasetStore::with_dataset(&path, Dataset::default());

        let err = store
            .try_replace(json!({"tools": [{"TLMS_TOOL_ID": "T-1"}]}))
            .unwrap_err();
        assert!(matches!(err, DatasetError::Io(_)));
        assert!(store.snapshot().is_empty());
        assert!(path.is_dir());
    }

    #[test]
    fn readers_keep_their_snapshot_across_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("tools.json"));
        let old = store.snapshot();

        assert!(store.replace(json!({"tools": [{}, {}]})));
        assert!(old.is_empty());
        assert_eq!(store.snapshot().len(), 2);
    }
}
