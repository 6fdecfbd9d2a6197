//! Override resolution: base runners + override entries → effective runners.

use serde::{Deserialize, Serialize};

use crate::data::overrides::Overrides;
use crate::domain::{EffectiveRunner, Runner, RunnerId};

/// Apply overrides field by field.
///
/// For every runner with an entry, each field present in the entry replaces
/// the base value (an explicit `null` clears it). Runners without an entry
/// pass through unchanged. Entries for unknown runner ids are ignored here;
/// see [`override_snapshot`] for a view that keeps them.
pub fn resolve(base: &[Runner], overrides: &Overrides) -> Vec<EffectiveRunner> {
    base.iter()
        .map(|runner| {
            let mut effective = runner.clone();
            if let Some(patch) = overrides.get(&runner.runner_id) {
                patch.apply(&mut effective);
            }
            EffectiveRunner::new(effective)
        })
        .collect()
}

/// One row of the override audit export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideSnapshotRow {
    pub runner_id: RunnerId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub street: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub default_pace_sec: Option<f64>,
    pub preferred_distance: Option<String>,
    pub favorite_stage: Option<String>,
    pub tshirt_size: Option<String>,
    pub food_preference: Option<String>,
    pub active: Option<bool>,
    pub notes: Option<String>,
}

impl From<Runner> for OverrideSnapshotRow {
    fn from(r: Runner) -> Self {
        Self {
            runner_id: r.runner_id,
            first_name: r.first_name,
            last_name: r.last_name,
            company: r.company,
            email: r.email,
            mobile: r.mobile,
            street: r.street,
            zip_code: r.zip_code,
            city: r.city,
            country: r.country,
            gender: r.gender,
            birth_year: r.birth_year,
            default_pace_sec: r.default_pace_sec,
            preferred_distance: r.preferred_distance,
            favorite_stage: r.favorite_stage,
            tshirt_size: r.tshirt_size,
            food_preference: r.food_preference,
            active: r.active,
            notes: r.notes,
        }
    }
}

/// Merged base + override view, one row per runner id in the override set.
///
/// Override values win where they carry a value; a `null` override shows the
/// base value. Entries without a base runner export their override values
/// alone. Rows come out in runner id order.
pub fn override_snapshot(base: &[Runner], overrides: &Overrides) -> Vec<OverrideSnapshotRow> {
    overrides
        .iter()
        .map(|(runner_id, patch)| {
            let mut merged = base
                .iter()
                .find(|r| &r.runner_id == runner_id)
                .cloned()
                .unwrap_or_else(|| Runner::bare(runner_id.clone()));
            patch.apply_non_null(&mut merged);
            OverrideSnapshotRow::from(merged)
        })
        .collect()
}
