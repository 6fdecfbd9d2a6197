use serde::{Deserialize, Serialize};

use super::de::opt_string_or_number;
use super::ids::{LegId, RaceId, TeamId};

/// One edition of the relay (one per year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    #[serde(alias = "id")]
    pub race_id: RaceId,
    pub year: i32,
    #[serde(default)]
    pub event_name: Option<String>,
    /// Number of registered teams, when the organiser published it.
    #[serde(default)]
    pub num_teams: Option<u32>,
}

/// A stage of a race. `(race_id, leg_number)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(alias = "id")]
    pub leg_id: LegId,
    pub race_id: RaceId,
    /// 1-based, contiguous within a race.
    pub leg_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

impl Leg {
    /// Distance with an unset value counted as zero.
    pub fn distance_or_zero(&self) -> f64 {
        self.distance_km.unwrap_or(0.0)
    }
}

/// A team entered in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(alias = "id")]
    pub team_id: TeamId,
    pub race_id: RaceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub bib_number: Option<String>,
    #[serde(default)]
    pub rank_final: Option<u32>,
    #[serde(default)]
    pub time_final_seconds: Option<f64>,
    #[serde(default)]
    pub pace_final_sec_per_km: Option<f64>,
}
