//! Entity loading from the processed JSON files.
//!
//! Layout: `{data_dir}/{races,legs,teams,runners,results}.json`, each a JSON
//! array of uniformly-shaped records. Primary keys may be spelled `id` or
//! `<entity>_id`; both land in `<entity>_id`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::{Leg, LegResult, Race, RaceId, Runner, Team};

/// Errors from reading entity files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing data file: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The five base collections, exactly as loaded (runners without overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub races: Vec<Race>,
    pub legs: Vec<Leg>,
    pub teams: Vec<Team>,
    pub runners: Vec<Runner>,
    pub results: Vec<LegResult>,
}

impl Dataset {
    /// Load all five collections from `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self, LoadError> {
        let dataset = Self {
            races: read_collection(data_dir, "races")?,
            legs: read_collection(data_dir, "legs")?,
            teams: read_collection(data_dir, "teams")?,
            runners: read_collection(data_dir, "runners")?,
            results: read_collection(data_dir, "results")?,
        };
        info!(
            races = dataset.races.len(),
            legs = dataset.legs.len(),
            teams = dataset.teams.len(),
            runners = dataset.runners.len(),
            results = dataset.results.len(),
            "all data files loaded"
        );
        Ok(dataset)
    }

    /// BLAKE3 hash over the serialized collections.
    ///
    /// Two datasets with the same fingerprint produce the same fact table.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Years with a race, ascending and deduplicated.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.races.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.races.iter().map(|r| r.year).max()
    }

    pub fn race_for_year(&self, year: i32) -> Option<&Race> {
        self.races.iter().find(|r| r.year == year)
    }

    /// Legs of one race, sorted by leg number.
    pub fn legs_for_race(&self, race_id: &RaceId) -> Vec<&Leg> {
        let mut legs: Vec<&Leg> = self.legs.iter().filter(|l| &l.race_id == race_id).collect();
        legs.sort_by_key(|l| l.leg_number);
        legs
    }
}

/// Read one named collection (`{data_dir}/{name}.json`).
pub fn read_collection<T: DeserializeOwned>(data_dir: &Path, name: &str) -> Result<Vec<T>, LoadError> {
    let path = data_dir.join(format!("{name}.json"));
    if !path.exists() {
        error!(path = %path.display(), "missing data file");
        return Err(LoadError::MissingFile { path });
    }

    let content = fs::read_to_string(&path).map_err(|source| {
        error!(path = %path.display(), %source, "error reading data file");
        LoadError::Io {
            path: path.clone(),
            source,
        }
    })?;

    let records: Vec<T> = serde_json::from_str(&content).map_err(|source| {
        error!(path = %path.display(), %source, "invalid JSON in data file");
        LoadError::Parse {
            path: path.clone(),
            source,
        }
    })?;

    debug!(count = records.len(), "loaded records from {name}.json");
    Ok(records)
}
