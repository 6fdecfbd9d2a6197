//! Year overview and runner profile views.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use relaylab_core::domain::{LegId, RunnerId, TeamId};
use relaylab_core::fact::{FactRow, FactTable};
use serde::Serialize;

use crate::metrics::{best_final_team_rank, mean, runner_summary, BestTeamRank, RunnerStats};

/// Which slice of a year to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearQuery {
    pub year: i32,
    pub team_id: Option<TeamId>,
    pub runner_id: Option<RunnerId>,
}

impl YearQuery {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            team_id: None,
            runner_id: None,
        }
    }

    pub fn team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn runner(mut self, runner_id: RunnerId) -> Self {
        self.runner_id = Some(runner_id);
        self
    }

    fn matches(&self, row: &FactRow) -> bool {
        row.year == Some(self.year)
            && self.team_id.as_ref().map_or(true, |t| &row.team_id == t)
            && self.runner_id.as_ref().map_or(true, |r| &row.runner_id == r)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDistance {
    pub leg_number: u32,
    pub leg_name: Option<String>,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankPoint {
    pub leg_number: u32,
    pub team_rank_after_leg: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearOverview<'a> {
    pub year: i32,
    pub teams: usize,
    pub runners: usize,
    pub legs: usize,
    pub total_distance_km: f64,
    pub mean_pace_sec_per_km: Option<f64>,
    /// Registered team count, when the race defines exactly one.
    pub registered_teams: Option<u32>,
    pub stage_distances: Vec<StageDistance>,
    /// Rank after each stage; only when the slice holds exactly one team.
    pub team_rank_progression: Option<Vec<RankPoint>>,
    /// Sorted by team name, then stage.
    pub results: Vec<&'a FactRow>,
}

pub fn year_overview<'a>(table: &'a FactTable, query: &YearQuery) -> YearOverview<'a> {
    let mut rows: Vec<&'a FactRow> = table.iter().filter(|r| query.matches(r)).collect();

    let teams: BTreeSet<&TeamId> = rows.iter().map(|r| &r.team_id).collect();
    let runners: BTreeSet<&RunnerId> = rows.iter().map(|r| &r.runner_id).collect();
    let legs: BTreeSet<&LegId> = rows.iter().map(|r| &r.leg_id).collect();
    let registered: BTreeSet<u32> = rows.iter().filter_map(|r| r.num_teams).collect();

    let mut stage_distances: Vec<StageDistance> = Vec::new();
    for r in &rows {
        let Some(leg_number) = r.leg_number else { continue };
        let stage = StageDistance {
            leg_number,
            leg_name: r.leg_name.clone(),
            distance_km: r.distance_km,
        };
        if !stage_distances.contains(&stage) {
            stage_distances.push(stage);
        }
    }
    stage_distances.sort_by_key(|s| s.leg_number);

    let team_rank_progression = (teams.len() == 1).then(|| {
        let mut points: Vec<RankPoint> = rows
            .iter()
            .filter_map(|r| {
                Some(RankPoint {
                    leg_number: r.leg_number?,
                    team_rank_after_leg: r.team_rank_after_leg?,
                })
            })
            .collect();
        points.sort_by_key(|p| p.leg_number);
        points
    });

    let overview_teams = teams.len();
    let overview_runners = runners.len();
    let overview_legs = legs.len();
    let total_distance_km = rows.iter().map(|r| r.distance_or_zero()).sum();
    let mean_pace_sec_per_km = mean(rows.iter().map(|r| r.ind_pace_sec_per_km));

    rows.sort_by(|a, b| {
        (a.team_name.is_none(), &a.team_name, a.leg_number.is_none(), a.leg_number).cmp(&(
            b.team_name.is_none(),
            &b.team_name,
            b.leg_number.is_none(),
            b.leg_number,
        ))
    });

    YearOverview {
        year: query.year,
        teams: overview_teams,
        runners: overview_runners,
        legs: overview_legs,
        total_distance_km,
        mean_pace_sec_per_km,
        registered_teams: if registered.len() == 1 {
            registered.first().copied()
        } else {
            None
        },
        stage_distances,
        team_rank_progression,
        results: rows,
    }
}

/// Teams that ran in `year`, sorted by name.
pub fn teams_in_year(table: &FactTable, year: i32) -> Vec<(TeamId, Option<String>)> {
    let mut teams: Vec<(TeamId, Option<String>)> = Vec::new();
    for r in table.for_year(year) {
        if !teams.iter().any(|(id, _)| id == &r.team_id) {
            teams.push((r.team_id.clone(), r.team_name.clone()));
        }
    }
    teams.sort_by(|a, b| a.1.cmp(&b.1));
    teams
}

/// One runner's career: aggregate, best final team rank, and every run.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerProfile<'a> {
    pub stats: RunnerStats,
    pub best_final_team_rank: Option<BestTeamRank>,
    /// Newest year first, then by stage.
    pub runs: Vec<&'a FactRow>,
}

pub fn runner_profile<'a>(table: &'a FactTable, runner_id: &RunnerId) -> RunnerProfile<'a> {
    let mut runs: Vec<&'a FactRow> = table.for_runner(runner_id).collect();
    runs.sort_by_key(|r| (Reverse(r.year), r.leg_number));

    RunnerProfile {
        stats: runner_summary(runs.iter().copied(), runner_id),
        best_final_team_rank: best_final_team_rank(table.iter(), runner_id),
        runs,
    }
}
