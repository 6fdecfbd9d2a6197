//! Caller-owned fact table cache.
//!
//! The fact table is a pure function of the base dataset and the override
//! state, so it is keyed by the dataset fingerprint plus the override
//! store's generation. Any override mutation bumps the generation and the
//! next lookup rebuilds. [`FactCache::invalidate`] forces a rebuild.

use std::path::PathBuf;

use tracing::debug;

use crate::data::{resolve, Dataset, OverrideStore};
use crate::fact::{build_fact_table, FactTable, JoinError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    dataset: String,
    overrides_path: PathBuf,
    overrides_generation: u64,
}

#[derive(Debug)]
struct CacheEntry {
    key: CacheKey,
    table: FactTable,
}

/// Holds at most one built fact table.
#[derive(Debug, Default)]
pub struct FactCache {
    entry: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl FactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table if its inputs are unchanged, building it otherwise.
    pub fn get_or_build(
        &mut self,
        dataset: &Dataset,
        store: &OverrideStore,
    ) -> Result<&FactTable, JoinError> {
        let key = CacheKey {
            dataset: dataset.fingerprint(),
            overrides_path: store.path().to_path_buf(),
            overrides_generation: store.generation(),
        };

        let entry = match self.entry.take() {
            Some(entry) if entry.key == key => {
                self.hits += 1;
                entry
            }
            _ => {
                self.misses += 1;
                let runners = resolve(&dataset.runners, store.overrides());
                let table = build_fact_table(
                    &dataset.races,
                    &dataset.legs,
                    &dataset.teams,
                    &runners,
                    &dataset.results,
                )?;
                debug!(rows = table.len(), generation = key.overrides_generation, "fact table rebuilt");
                CacheEntry { key, table }
            }
        };

        Ok(&self.entry.insert(entry).table)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_cached(&self) -> bool {
        self.entry.is_some()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
