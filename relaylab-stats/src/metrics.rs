//! Runner metrics: pure aggregations over fact rows.
//!
//! Every metric takes any iterator of fact rows (pre-filter with a predicate
//! as needed) and returns plain serializable records. Missing values are
//! excluded from aggregates, except distance which counts missing as zero.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use relaylab_core::domain::{RunnerId, TeamId};
use relaylab_core::fact::FactRow;
use serde::Serialize;

/// Career aggregate for one runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerStats {
    pub runner_id: RunnerId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub active: Option<bool>,
    pub is_external: Option<bool>,
    /// Number of result rows (leg participations).
    pub starts: usize,
    /// Distinct race years.
    pub years: usize,
    pub total_distance_km: f64,
    pub mean_pace_sec_per_km: Option<f64>,
    pub best_ind_rank: Option<u32>,
    pub best_team_rank_after_leg: Option<u32>,
}

impl RunnerStats {
    /// Stats of a runner without any rows.
    pub fn empty(runner_id: RunnerId) -> Self {
        Self {
            runner_id,
            first_name: None,
            last_name: None,
            company: None,
            active: None,
            is_external: None,
            starts: 0,
            years: 0,
            total_distance_km: 0.0,
            mean_pace_sec_per_km: None,
            best_ind_rank: None,
            best_team_rank_after_leg: None,
        }
    }

    /// "First Last", or the runner id when neither part is known.
    pub fn name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => self.runner_id.to_string(),
        }
    }
}

#[derive(Debug)]
struct Accumulator {
    stats: RunnerStats,
    years: BTreeSet<i32>,
    pace_sum: f64,
    pace_count: usize,
}

impl Accumulator {
    fn new(runner_id: RunnerId) -> Self {
        Self {
            stats: RunnerStats::empty(runner_id),
            years: BTreeSet::new(),
            pace_sum: 0.0,
            pace_count: 0,
        }
    }

    fn push(&mut self, row: &FactRow) {
        let s = &mut self.stats;
        fill_first(&mut s.first_name, &row.first_name);
        fill_first(&mut s.last_name, &row.last_name);
        fill_first(&mut s.company, &row.company);
        fill_first(&mut s.active, &row.active);
        fill_first(&mut s.is_external, &row.is_external);

        s.starts += 1;
        s.total_distance_km += row.distance_or_zero();
        s.best_ind_rank = min_opt(s.best_ind_rank, row.ind_rank_leg);
        s.best_team_rank_after_leg = min_opt(s.best_team_rank_after_leg, row.team_rank_after_leg);

        if let Some(year) = row.year {
            self.years.insert(year);
        }
        if let Some(pace) = row.ind_pace_sec_per_km {
            self.pace_sum += pace;
            self.pace_count += 1;
        }
    }

    fn finish(mut self) -> RunnerStats {
        self.stats.years = self.years.len();
        self.stats.mean_pace_sec_per_km = if self.pace_count > 0 {
            Some(self.pace_sum / self.pace_count as f64)
        } else {
            None
        };
        self.stats
    }
}

fn fill_first<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

fn min_opt(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Mean of the present values; `None` when there are none.
pub fn mean<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// One aggregate per runner id appearing in `rows`, ordered by runner id.
pub fn runner_stats<'a, I>(rows: I) -> Vec<RunnerStats>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut groups: BTreeMap<&RunnerId, Accumulator> = BTreeMap::new();
    for row in rows {
        groups
            .entry(&row.runner_id)
            .or_insert_with(|| Accumulator::new(row.runner_id.clone()))
            .push(row);
    }
    groups.into_values().map(Accumulator::finish).collect()
}

/// Aggregate for a single runner. A runner without rows gets zero counts
/// and `None` means.
pub fn runner_summary<'a, I>(rows: I, runner_id: &RunnerId) -> RunnerStats
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut acc = Accumulator::new(runner_id.clone());
    for row in rows.into_iter().filter(|r| &r.runner_id == runner_id) {
        acc.push(row);
    }
    acc.finish()
}

/// The best final placing of any team a runner ran for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestTeamRank {
    pub team_id: TeamId,
    pub team_name: Option<String>,
    pub year: Option<i32>,
    pub rank_final: u32,
}

/// Lowest non-null `rank_final` across the runner's (team, year) pairs.
/// Ties keep the first pair encountered.
pub fn best_final_team_rank<'a, I>(rows: I, runner_id: &RunnerId) -> Option<BestTeamRank>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut seen: HashSet<(&TeamId, Option<i32>)> = HashSet::new();
    let mut best: Option<(&FactRow, u32)> = None;

    for row in rows.into_iter().filter(|r| &r.runner_id == runner_id) {
        if !seen.insert((&row.team_id, row.year)) {
            continue;
        }
        let Some(rank) = row.rank_final else { continue };
        if best.map_or(true, |(_, current)| rank < current) {
            best = Some((row, rank));
        }
    }

    best.map(|(row, rank_final)| BestTeamRank {
        team_id: row.team_id.clone(),
        team_name: row.team_name.clone(),
        year: row.year,
        rank_final,
    })
}

/// Mean individual pace for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearPace {
    pub year: i32,
    pub mean_pace_sec_per_km: Option<f64>,
}

/// Mean pace per year for a runner, ascending by year. Rows without a year are skipped.
pub fn pace_by_year<'a, I>(rows: I, runner_id: &RunnerId) -> Vec<YearPace>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut by_year: BTreeMap<i32, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| &r.runner_id == runner_id) {
        if let Some(year) = row.year {
            by_year.entry(year).or_default().push(row.ind_pace_sec_per_km);
        }
    }
    by_year
        .into_iter()
        .map(|(year, paces)| YearPace {
            year,
            mean_pace_sec_per_km: mean(paces),
        })
        .collect()
}

/// How often a runner ran one stage number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub leg_number: u32,
    pub count: usize,
}

/// Times run per stage number, ascending by stage. Rows without a leg are skipped.
pub fn stage_frequency<'a, I>(rows: I, runner_id: &RunnerId) -> Vec<StageCount>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| &r.runner_id == runner_id) {
        if let Some(n) = row.leg_number {
            *counts.entry(n).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(leg_number, count)| StageCount { leg_number, count })
        .collect()
}
