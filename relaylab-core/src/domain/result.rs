use serde::{Deserialize, Serialize};

use super::de::opt_string_or_number;
use super::ids::{LegId, RaceId, RunnerId, TeamId};

/// One runner's participation in one leg for one team.
///
/// Results carry no explicit id; their position in the results collection
/// is their identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub runner_id: RunnerId,
    pub leg_id: LegId,
    pub team_id: TeamId,
    pub race_id: RaceId,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub bib_number: Option<String>,
    #[serde(default)]
    pub ind_time_seconds: Option<f64>,
    #[serde(default)]
    pub ind_pace_sec_per_km: Option<f64>,
    /// Rank within the leg, 1 = fastest.
    #[serde(default)]
    pub ind_rank_leg: Option<u32>,
    #[serde(default)]
    pub team_rank_after_leg: Option<u32>,
    #[serde(default)]
    pub team_time_after_leg_seconds: Option<f64>,
    #[serde(default)]
    pub team_pace_after_leg_sec_per_km: Option<f64>,
    #[serde(default)]
    pub is_external: Option<bool>,
}

impl LegResult {
    /// A result row with only its foreign keys set.
    pub fn new(runner_id: RunnerId, leg_id: LegId, team_id: TeamId, race_id: RaceId) -> Self {
        Self {
            runner_id,
            leg_id,
            team_id,
            race_id,
            bib_number: None,
            ind_time_seconds: None,
            ind_pace_sec_per_km: None,
            ind_rank_leg: None,
            team_rank_after_leg: None,
            team_time_after_leg_seconds: None,
            team_pace_after_leg_sec_per_km: None,
            is_external: None,
        }
    }
}
