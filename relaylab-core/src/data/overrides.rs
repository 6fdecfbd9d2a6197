//! Runner override store: the only mutable persisted state.
//!
//! The document is a single JSON object: runner id → partial field map.
//! Loading never fails: a missing file is an empty set, a malformed file is
//! an empty set plus a warning. Entries are decoded one by one; an entry
//! that does not decode is skipped with a warning but kept verbatim, so a
//! save writes it back. Saving replaces the whole document atomically
//! (write to `.tmp`, rename into place); last writer wins. A store whose
//! file could not be read as a JSON object refuses to save over it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{RunnerId, RunnerPatch};

/// Errors from persisting overrides.
#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("failed to save overrides to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize overrides: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("refusing to overwrite {}: the file could not be read, fix or remove it first", path.display())]
    Unreadable { path: PathBuf },
}

/// All override entries, keyed by runner id.
///
/// Entries may reference runners that are not (or no longer) in the base
/// collection; they are kept and exported all the same. Entries that failed
/// to decode are held apart in `rejected`: resolution never sees them, but
/// they serialize back unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: BTreeMap<RunnerId, RunnerPatch>,
    rejected: BTreeMap<RunnerId, Value>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode each entry on its own, setting aside the ones that fail.
    fn from_raw(raw: BTreeMap<RunnerId, Value>) -> Self {
        let mut overrides = Self::new();
        for (runner_id, value) in raw {
            match serde_json::from_value::<RunnerPatch>(value.clone()) {
                Ok(patch) => {
                    overrides.entries.insert(runner_id, patch);
                }
                Err(e) => {
                    warn!(runner = %runner_id, error = %e, "invalid override entry, skipping");
                    overrides.rejected.insert(runner_id, value);
                }
            }
        }
        overrides
    }

    pub fn get(&self, runner_id: &RunnerId) -> Option<&RunnerPatch> {
        self.entries.get(runner_id)
    }

    /// Replace the entry for `runner_id`. Returns the previous entry.
    pub fn insert(&mut self, runner_id: RunnerId, patch: RunnerPatch) -> Option<RunnerPatch> {
        self.rejected.remove(&runner_id);
        self.entries.insert(runner_id, patch)
    }

    /// Merge `patch` into the runner's entry, creating it if needed.
    ///
    /// A rejected entry is patched in its raw form and decoded again, so
    /// correcting the offending field revives the rest of the entry.
    pub fn merge(&mut self, runner_id: RunnerId, patch: RunnerPatch) {
        if let Some(existing) = self.entries.get_mut(&runner_id) {
            existing.merge(patch);
            return;
        }
        let Some(Value::Object(mut raw)) = self.rejected.remove(&runner_id) else {
            self.entries.insert(runner_id, patch);
            return;
        };
        if let Ok(Value::Object(fields)) = serde_json::to_value(&patch) {
            raw.extend(fields);
        }
        match serde_json::from_value::<RunnerPatch>(Value::Object(raw.clone())) {
            Ok(revived) => {
                self.entries.insert(runner_id, revived);
            }
            Err(_) => {
                self.rejected.insert(runner_id, Value::Object(raw));
            }
        }
    }

    /// Remove the runner's entry, rejected or not. A removed rejected entry
    /// comes back as an empty patch.
    pub fn remove(&mut self, runner_id: &RunnerId) -> Option<RunnerPatch> {
        let rejected = self.rejected.remove(runner_id);
        match self.entries.remove(runner_id) {
            Some(patch) => Some(patch),
            None => rejected.map(|_| RunnerPatch::default()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RunnerId, &RunnerPatch)> {
        self.entries.iter()
    }

    pub fn runner_ids(&self) -> impl Iterator<Item = &RunnerId> {
        self.entries.keys()
    }

    /// Entries kept verbatim because they failed to decode.
    pub fn rejected(&self) -> impl Iterator<Item = (&RunnerId, &Value)> {
        self.rejected.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(RunnerId, RunnerPatch)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (RunnerId, RunnerPatch)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            rejected: BTreeMap::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum StoredEntry<'a> {
    Patch(&'a RunnerPatch),
    Raw(&'a Value),
}

impl Serialize for Overrides {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut document: BTreeMap<&RunnerId, StoredEntry<'_>> = self
            .rejected
            .iter()
            .map(|(id, raw)| (id, StoredEntry::Raw(raw)))
            .collect();
        document.extend(self.entries.iter().map(|(id, patch)| (id, StoredEntry::Patch(patch))));
        document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Overrides {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<RunnerId, Value>::deserialize(deserializer).map(Self::from_raw)
    }
}

/// Outcome of reading the override file.
enum Loaded {
    Missing,
    Parsed(Overrides),
    Unreadable,
}

fn read_overrides(path: &Path) -> Loaded {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no runner overrides file found");
            return Loaded::Missing;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable overrides file, ignoring");
            return Loaded::Unreadable;
        }
    };

    match serde_json::from_str::<Overrides>(&content) {
        Ok(overrides) => {
            info!(count = overrides.len(), "loaded runner overrides");
            Loaded::Parsed(overrides)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid overrides file, ignoring");
            Loaded::Unreadable
        }
    }
}

/// Load overrides from `path`. Returns an empty set if the file is missing or malformed.
pub fn load_overrides(path: &Path) -> Overrides {
    match read_overrides(path) {
        Loaded::Parsed(overrides) => overrides,
        Loaded::Missing | Loaded::Unreadable => Overrides::new(),
    }
}

/// Save overrides to `path`, replacing the previous document atomically.
pub fn save_overrides(path: &Path, overrides: &Overrides) -> Result<(), OverrideError> {
    let io_err = |source| OverrideError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(overrides)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(io_err)?;

    // Atomic rename
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })?;

    info!(count = overrides.len(), "saved runner overrides");
    Ok(())
}

/// In-memory override state bound to its backing file.
///
/// Mutations only touch memory; [`OverrideStore::save`] persists. A failed
/// save leaves the in-memory state intact and usable. Every mutation bumps
/// [`OverrideStore::generation`], which callers use to invalidate caches.
#[derive(Debug)]
pub struct OverrideStore {
    path: PathBuf,
    overrides: Overrides,
    generation: u64,
    /// Set when the file exists but is not a readable JSON object.
    unreadable: bool,
}

impl OverrideStore {
    /// Open the store at `path`, loading whatever valid state is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (overrides, unreadable) = match read_overrides(&path) {
            Loaded::Parsed(overrides) => (overrides, false),
            Loaded::Missing => (Overrides::new(), false),
            Loaded::Unreadable => (Overrides::new(), true),
        };
        Self {
            path,
            overrides,
            generation: 0,
            unreadable,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, whether or not a base runner exists for them.
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn get(&self, runner_id: &RunnerId) -> Option<&RunnerPatch> {
        self.overrides.get(runner_id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the entry for a runner with `patch`.
    pub fn set(&mut self, runner_id: RunnerId, patch: RunnerPatch) {
        self.overrides.insert(runner_id, patch);
        self.generation += 1;
    }

    /// Merge `patch` into the runner's existing entry (or create one).
    pub fn update(&mut self, runner_id: RunnerId, patch: RunnerPatch) {
        self.overrides.merge(runner_id, patch);
        self.generation += 1;
    }

    pub fn remove(&mut self, runner_id: &RunnerId) -> Option<RunnerPatch> {
        let removed = self.overrides.remove(runner_id);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Persist the full document.
    pub fn save(&self) -> Result<(), OverrideError> {
        if self.unreadable {
            return Err(OverrideError::Unreadable {
                path: self.path.clone(),
            });
        }
        save_overrides(&self.path, &self.overrides)
    }

    /// Discard in-memory state and re-read the file.
    pub fn reload(&mut self) {
        let reopened = Self::open(self.path.clone());
        self.overrides = reopened.overrides;
        self.unreadable = reopened.unreadable;
        self.generation += 1;
    }
}
