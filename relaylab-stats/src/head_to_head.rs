//! Head-to-head comparison of two runners on the stages both have run.
//!
//! Stages are matched on `leg_id`, which identifies one stage of one race
//! year. If a runner appears more than once on the same leg, the runs are
//! paired off in result order, so a matchup count never exceeds either
//! runner's stage count. A matched stage where either individual time is
//! missing is a no-contest and does not count toward wins, losses or ties.

use std::collections::{HashMap, VecDeque};

use relaylab_core::domain::{LegId, RunnerId};
use relaylab_core::fact::FactRow;
use serde::Serialize;

use crate::error::StatsError;
use crate::metrics::{
    best_final_team_rank, pace_by_year, runner_summary, stage_frequency, BestTeamRank, RunnerStats,
    StageCount, YearPace,
};

/// Result of one matched stage, from A's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AWins,
    BWins,
    Tie,
    NoContest,
}

impl Outcome {
    fn decide(a: Option<f64>, b: Option<f64>) -> Self {
        match (a, b) {
            (Some(a), Some(b)) if a < b => Outcome::AWins,
            (Some(a), Some(b)) if a > b => Outcome::BWins,
            (Some(_), Some(_)) => Outcome::Tie,
            _ => Outcome::NoContest,
        }
    }

    /// The same outcome seen from B's side.
    pub fn flipped(self) -> Self {
        match self {
            Outcome::AWins => Outcome::BWins,
            Outcome::BWins => Outcome::AWins,
            other => other,
        }
    }
}

/// One runner's side of a matched stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRun {
    pub result_index: usize,
    pub year: Option<i32>,
    pub leg_number: Option<u32>,
    pub leg_name: Option<String>,
    pub distance_km: Option<f64>,
    pub ind_time_seconds: Option<f64>,
    pub ind_pace_sec_per_km: Option<f64>,
    pub ind_rank_leg: Option<u32>,
}

impl From<&FactRow> for StageRun {
    fn from(row: &FactRow) -> Self {
        Self {
            result_index: row.result_index,
            year: row.year,
            leg_number: row.leg_number,
            leg_name: row.leg_name.clone(),
            distance_km: row.distance_km,
            ind_time_seconds: row.ind_time_seconds,
            ind_pace_sec_per_km: row.ind_pace_sec_per_km,
            ind_rank_leg: row.ind_rank_leg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matchup {
    pub leg_id: LegId,
    pub a: StageRun,
    pub b: StageRun,
    pub outcome: Outcome,
}

/// Career context for one side of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contender {
    pub stats: RunnerStats,
    pub best_final_team_rank: Option<BestTeamRank>,
    pub pace_by_year: Vec<YearPace>,
    pub stage_frequency: Vec<StageCount>,
}

impl Contender {
    fn compute(rows: &[FactRow], runner_id: &RunnerId) -> Self {
        Self {
            stats: runner_summary(rows, runner_id),
            best_final_team_rank: best_final_team_rank(rows, runner_id),
            pace_by_year: pace_by_year(rows, runner_id),
            stage_frequency: stage_frequency(rows, runner_id),
        }
    }

    pub fn name(&self) -> String {
        self.stats.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadToHead {
    pub a: Contender,
    pub b: Contender,
    /// In A's result order.
    pub matchups: Vec<Matchup>,
    pub a_wins: usize,
    pub b_wins: usize,
    pub ties: usize,
    pub no_contests: usize,
}

impl HeadToHead {
    /// Matchups that produced a result (everything but no-contests).
    pub fn decided(&self) -> usize {
        self.a_wins + self.b_wins + self.ties
    }
}

/// Compare runner `a` with runner `b` over `rows`.
///
/// Fails with [`StatsError::InvalidComparison`] if both ids are the same.
pub fn head_to_head(rows: &[FactRow], a: &RunnerId, b: &RunnerId) -> Result<HeadToHead, StatsError> {
    if a == b {
        return Err(StatsError::InvalidComparison(a.clone()));
    }

    let mut b_runs: HashMap<&LegId, VecDeque<&FactRow>> = HashMap::new();
    for row in rows.iter().filter(|r| &r.runner_id == b) {
        b_runs.entry(&row.leg_id).or_default().push_back(row);
    }

    let mut matchups = Vec::new();
    for a_row in rows.iter().filter(|r| &r.runner_id == a) {
        let Some(b_row) = b_runs.get_mut(&a_row.leg_id).and_then(VecDeque::pop_front) else {
            continue;
        };
        matchups.push(Matchup {
            leg_id: a_row.leg_id.clone(),
            a: StageRun::from(a_row),
            b: StageRun::from(b_row),
            outcome: Outcome::decide(a_row.ind_time_seconds, b_row.ind_time_seconds),
        });
    }

    let count = |o: Outcome| matchups.iter().filter(|m| m.outcome == o).count();
    let (a_wins, b_wins, ties, no_contests) = (
        count(Outcome::AWins),
        count(Outcome::BWins),
        count(Outcome::Tie),
        count(Outcome::NoContest),
    );

    Ok(HeadToHead {
        a: Contender::compute(rows, a),
        b: Contender::compute(rows, b),
        matchups,
        a_wins,
        b_wins,
        ties,
        no_contests,
    })
}
