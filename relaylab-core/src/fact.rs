//! Fact join engine: one denormalized row per result.
//!
//! Join order is fixed:
//!
//! ```text
//! results ⟕ effective runners (runner_id)
//!         ⟕ legs             (leg_id)
//!         ⟕ teams            (team_id)
//!         ⟕ races            (race_id; year, event_name, num_teams only)
//! ```
//!
//! Every join is a left join anchored on results: a dangling foreign key
//! yields `None` for the unmatched side, never a dropped row. Right-hand
//! tables must have unique primary keys, so the table always has exactly as
//! many rows as there are results, in results order.
//!
//! Colliding column names are renamed on the lower-priority side: leg
//! `name` → `leg_name`, team `name` → `team_name`, team `company` →
//! `team_company`, team `bib_number` → `team_bib_number`, and the leg/team
//! copies of `race_id` → `leg_race_id` / `team_race_id`.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    EffectiveRunner, Leg, LegId, LegResult, Race, RaceId, RunnerId, Team, TeamId,
};

/// Errors from building the fact table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("missing required data: '{0}' collection is empty")]
    MissingData(&'static str),

    #[error("duplicate primary key in '{collection}': {id}")]
    DuplicateKey { collection: &'static str, id: String },
}

/// One result with its runner, leg, team and race context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    /// Position of the source result in the results collection.
    pub result_index: usize,

    // ── Result ──
    pub runner_id: RunnerId,
    pub leg_id: LegId,
    pub team_id: TeamId,
    pub race_id: RaceId,
    pub bib_number: Option<String>,
    pub ind_time_seconds: Option<f64>,
    pub ind_pace_sec_per_km: Option<f64>,
    pub ind_rank_leg: Option<u32>,
    pub team_rank_after_leg: Option<u32>,
    pub team_time_after_leg_seconds: Option<f64>,
    pub team_pace_after_leg_sec_per_km: Option<f64>,
    pub is_external: Option<bool>,

    // ── Effective runner ──
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

    // ── Leg ──
    pub leg_race_id: Option<RaceId>,
    pub leg_number: Option<u32>,
    pub leg_name: Option<String>,
    pub distance_km: Option<f64>,

    // ── Team ──
    pub team_race_id: Option<RaceId>,
    pub team_name: Option<String>,
    pub team_company: Option<String>,
    pub team_bib_number: Option<String>,
    pub rank_final: Option<u32>,
    pub time_final_seconds: Option<f64>,
    pub pace_final_sec_per_km: Option<f64>,

    // ── Race ──
    pub year: Option<i32>,
    pub event_name: Option<String>,
    pub num_teams: Option<u32>,
}

impl FactRow {
    /// "First Last" of the joined runner, or the runner id when unmatched.
    pub fn runner_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => self.runner_id.to_string(),
        }
    }

    /// Leg distance with an unset value counted as zero.
    pub fn distance_or_zero(&self) -> f64 {
        self.distance_km.unwrap_or(0.0)
    }

    /// A row carrying only the result columns; every joined column is `None`.
    pub fn from_result(index: usize, r: &LegResult) -> Self {
        Self {
            result_index: index,
            runner_id: r.runner_id.clone(),
            leg_id: r.leg_id.clone(),
            team_id: r.team_id.clone(),
            race_id: r.race_id.clone(),
            bib_number: r.bib_number.clone(),
            ind_time_seconds: r.ind_time_seconds,
            ind_pace_sec_per_km: r.ind_pace_sec_per_km,
            ind_rank_leg: r.ind_rank_leg,
            team_rank_after_leg: r.team_rank_after_leg,
            team_time_after_leg_seconds: r.team_time_after_leg_seconds,
            team_pace_after_leg_sec_per_km: r.team_pace_after_leg_sec_per_km,
            is_external: r.is_external,
            first_name: None,
            last_name: None,
            company: None,
            email: None,
            mobile: None,
            street: None,
            zip_code: None,
            city: None,
            country: None,
            gender: None,
            birth_year: None,
            default_pace_sec: None,
            preferred_distance: None,
            favorite_stage: None,
            tshirt_size: None,
            food_preference: None,
            active: None,
            notes: None,
            leg_race_id: None,
            leg_number: None,
            leg_name: None,
            distance_km: None,
            team_race_id: None,
            team_name: None,
            team_company: None,
            team_bib_number: None,
            rank_final: None,
            time_final_seconds: None,
            pace_final_sec_per_km: None,
            year: None,
            event_name: None,
            num_teams: None,
        }
    }

    fn join_runner(&mut self, runner: &EffectiveRunner) {
        self.first_name = runner.first_name.clone();
        self.last_name = runner.last_name.clone();
        self.company = runner.company.clone();
        self.email = runner.email.clone();
        self.mobile = runner.mobile.clone();
        self.street = runner.street.clone();
        self.zip_code = runner.zip_code.clone();
        self.city = runner.city.clone();
        self.country = runner.country.clone();
        self.gender = runner.gender.clone();
        self.birth_year = runner.birth_year;
        self.default_pace_sec = runner.default_pace_sec;
        self.preferred_distance = runner.preferred_distance.clone();
        self.favorite_stage = runner.favorite_stage.clone();
        self.tshirt_size = runner.tshirt_size.clone();
        self.food_preference = runner.food_preference.clone();
        self.active = runner.active;
        self.notes = runner.notes.clone();
    }

    fn join_leg(&mut self, leg: &Leg) {
        self.leg_race_id = Some(leg.race_id.clone());
        self.leg_number = Some(leg.leg_number);
        self.leg_name = leg.name.clone();
        self.distance_km = leg.distance_km;
    }

    fn join_team(&mut self, team: &Team) {
        self.team_race_id = Some(team.race_id.clone());
        self.team_name = team.name.clone();
        self.team_company = team.company.clone();
        self.team_bib_number = team.bib_number.clone();
        self.rank_final = team.rank_final;
        self.time_final_seconds = team.time_final_seconds;
        self.pace_final_sec_per_km = team.pace_final_sec_per_km;
    }

    fn join_race(&mut self, race: &Race) {
        self.year = Some(race.year);
        self.event_name = race.event_name.clone();
        self.num_teams = race.num_teams;
    }
}

/// The unified analytical table. Rows follow results order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactTable {
    rows: Vec<FactRow>,
}

impl FactTable {
    pub fn rows(&self) -> &[FactRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FactRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<FactRow> {
        self.rows
    }

    /// Rows of one runner, in table order.
    pub fn for_runner(&self, runner_id: &RunnerId) -> impl Iterator<Item = &FactRow> + '_ {
        let runner_id = runner_id.clone();
        self.rows.iter().filter(move |r| r.runner_id == runner_id)
    }

    /// Rows whose race falls in `year`, in table order.
    pub fn for_year(&self, year: i32) -> impl Iterator<Item = &FactRow> {
        self.rows.iter().filter(move |r| r.year == Some(year))
    }

    /// BLAKE3 hash over the serialized rows.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.rows).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

impl<'a> IntoIterator for &'a FactTable {
    type Item = &'a FactRow;
    type IntoIter = std::slice::Iter<'a, FactRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Build the fact table from the five collections.
///
/// Fails with [`JoinError::MissingData`] if any collection is empty, and
/// with [`JoinError::DuplicateKey`] if a right-hand table repeats a primary
/// key.
pub fn build_fact_table(
    races: &[Race],
    legs: &[Leg],
    teams: &[Team],
    runners: &[EffectiveRunner],
    results: &[LegResult],
) -> Result<FactTable, JoinError> {
    require_rows("races", races)?;
    require_rows("legs", legs)?;
    require_rows("teams", teams)?;
    require_rows("runners", runners)?;
    require_rows("results", results)?;

    let runner_index = unique_index("runners", runners, |r| &r.runner_id)?;
    let leg_index = unique_index("legs", legs, |l| &l.leg_id)?;
    let team_index = unique_index("teams", teams, |t| &t.team_id)?;
    let race_index = unique_index("races", races, |r| &r.race_id)?;

    let rows = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut row = FactRow::from_result(i, result);
            if let Some(runner) = runner_index.get(&result.runner_id) {
                row.join_runner(runner);
            }
            if let Some(leg) = leg_index.get(&result.leg_id) {
                row.join_leg(leg);
            }
            if let Some(team) = team_index.get(&result.team_id) {
                row.join_team(team);
            }
            if let Some(race) = race_index.get(&result.race_id) {
                row.join_race(race);
            }
            row
        })
        .collect();

    Ok(FactTable { rows })
}

fn require_rows<T>(collection: &'static str, rows: &[T]) -> Result<(), JoinError> {
    if rows.is_empty() {
        return Err(JoinError::MissingData(collection));
    }
    Ok(())
}

fn unique_index<'a, T, K, F>(
    collection: &'static str,
    rows: &'a [T],
    key: F,
) -> Result<HashMap<&'a K, &'a T>, JoinError>
where
    K: Eq + Hash + std::fmt::Display + 'a,
    F: Fn(&'a T) -> &'a K,
{
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        let k = key(row);
        if index.insert(k, row).is_some() {
            return Err(JoinError::DuplicateKey {
                collection,
                id: k.to_string(),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{resolve, Overrides};
    use crate::domain::Runner;

    fn race(id: &str, year: i32) -> Race {
        Race {
            race_id: RaceId::new(id),
            year,
            event_name: Some("SOLA".into()),
            num_teams: Some(100),
        }
    }

    fn leg(id: &str, race: &str, n: u32, km: f64) -> Leg {
        Leg {
            leg_id: LegId::new(id),
            race_id: RaceId::new(race),
            leg_number: n,
            name: Some(format!("Stage {n}")),
            distance_km: Some(km),
        }
    }

    fn team(id: &str, race: &str, name: &str) -> Team {
        Team {
            team_id: TeamId::new(id),
            race_id: RaceId::new(race),
            name: Some(name.into()),
            company: Some("TeamCo".into()),
            bib_number: Some("7".into()),
            rank_final: Some(3),
            time_final_seconds: None,
            pace_final_sec_per_km: None,
        }
    }

    fn runner(id: &str) -> Runner {
        let mut r = Runner::bare(RunnerId::new(id));
        r.first_name = Some("Anna".into());
        r.company = Some("RunnerCo".into());
        r
    }

    fn result(runner: &str, leg: &str, team: &str, race: &str) -> LegResult {
        LegResult::new(
            RunnerId::new(runner),
            LegId::new(leg),
            TeamId::new(team),
            RaceId::new(race),
        )
    }

    #[test]
    fn joins_all_context_and_renames_collisions() {
        let runners = resolve(&[runner("R1")], &Overrides::new());
        let table = build_fact_table(
            &[race("sola-2024", 2024)],
            &[leg("L1", "sola-2024", 1, 10.0)],
            &[team("T1", "sola-2024", "Optimizers")],
            &runners,
            &[result("R1", "L1", "T1", "sola-2024")],
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.leg_name.as_deref(), Some("Stage 1"));
        assert_eq!(row.team_name.as_deref(), Some("Optimizers"));
        assert_eq!(row.company.as_deref(), Some("RunnerCo"));
        assert_eq!(row.team_company.as_deref(), Some("TeamCo"));
        assert_eq!(row.year, Some(2024));
        assert_eq!(row.num_teams, Some(100));
        assert_eq!(row.distance_km, Some(10.0));
    }

    #[test]
    fn dangling_keys_keep_the_row() {
        let runners = resolve(&[runner("R1")], &Overrides::new());
        let table = build_fact_table(
            &[race("sola-2024", 2024)],
            &[leg("L1", "sola-2024", 1, 10.0)],
            &[team("T1", "sola-2024", "Optimizers")],
            &runners,
            &[
                result("R1", "L1", "T1", "sola-2024"),
                result("GHOST", "L404", "T404", "sola-1999"),
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let orphan = &table.rows()[1];
        assert_eq!(orphan.result_index, 1);
        assert_eq!(orphan.runner_id.as_str(), "GHOST");
        assert_eq!(orphan.first_name, None);
        assert_eq!(orphan.leg_number, None);
        assert_eq!(orphan.team_name, None);
        assert_eq!(orphan.year, None);
        assert_eq!(orphan.runner_name(), "GHOST");
    }

    #[test]
    fn empty_collection_is_missing_data() {
        let runners = resolve(&[runner("R1")], &Overrides::new());
        let err = build_fact_table(
            &[race("sola-2024", 2024)],
            &[],
            &[team("T1", "sola-2024", "Optimizers")],
            &runners,
            &[result("R1", "L1", "T1", "sola-2024")],
        )
        .unwrap_err();
        assert_eq!(err, JoinError::MissingData("legs"));
    }

    #[test]
    fn duplicate_primary_key_is_rejected() {
        let runners = resolve(&[runner("R1")], &Overrides::new());
        let err = build_fact_table(
            &[race("sola-2024", 2024)],
            &[leg("L1", "sola-2024", 1, 10.0)],
            &[team("T1", "sola-2024", "A"), team("T1", "sola-2024", "B")],
            &runners,
            &[result("R1", "L1", "T1", "sola-2024")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            JoinError::DuplicateKey {
                collection: "teams",
                id: "T1".into()
            }
        );
    }
}
