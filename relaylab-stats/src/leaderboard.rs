//! Top-N rankings: sorted, truncated views over runner stats, teams and fact rows.
//!
//! All sorts are stable. Ties beyond the documented keys keep input order:
//! runner stats come in runner id order (see [`crate::metrics::runner_stats`]),
//! fact rows in result order, teams in collection order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use relaylab_core::domain::{Race, RaceId, RunnerId, Team, TeamId};
use relaylab_core::fact::{FactRow, FactTable};
use relaylab_core::filter::RunnerFilter;
use serde::Serialize;

use crate::metrics::{runner_stats, RunnerStats};

/// Default size of the runner and stage top lists.
pub const TOP_N: usize = 10;
/// Default size of the team ranking list.
pub const TOP_TEAMS: usize = 5;
/// Individual stage ranks up to this value count as top finishes.
pub const TOP_FINISH_RANK: u32 = 10;

fn by_starts_then_years(a: &RunnerStats, b: &RunnerStats) -> Ordering {
    b.starts.cmp(&a.starts).then(b.years.cmp(&a.years))
}

/// All runners, most starts first, then most years.
pub fn runner_overview(mut stats: Vec<RunnerStats>) -> Vec<RunnerStats> {
    stats.sort_by(by_starts_then_years);
    stats
}

/// Longest total distance first.
pub fn top_by_distance(stats: &[RunnerStats], n: usize) -> Vec<RunnerStats> {
    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| b.total_distance_km.total_cmp(&a.total_distance_km));
    sorted.truncate(n);
    sorted
}

/// Most starts first, then most years.
pub fn top_by_starts(stats: &[RunnerStats], n: usize) -> Vec<RunnerStats> {
    let mut sorted = stats.to_vec();
    sorted.sort_by(by_starts_then_years);
    sorted.truncate(n);
    sorted
}

/// A team's final placing with its race year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRanking {
    pub team_id: TeamId,
    pub race_id: RaceId,
    /// From the races table; `None` if the team's race is unknown.
    pub year: Option<i32>,
    pub team_name: Option<String>,
    pub company: Option<String>,
    pub bib_number: Option<String>,
    pub rank_final: u32,
    pub time_final_seconds: Option<f64>,
    pub pace_final_sec_per_km: Option<f64>,
}

/// Best final team ranks across all years, lowest rank first.
pub fn top_final_team_ranks(teams: &[Team], races: &[Race], n: usize) -> Vec<TeamRanking> {
    let years: HashMap<&RaceId, i32> = races.iter().map(|r| (&r.race_id, r.year)).collect();

    let mut ranked: Vec<TeamRanking> = teams
        .iter()
        .filter_map(|t| {
            Some(TeamRanking {
                team_id: t.team_id.clone(),
                race_id: t.race_id.clone(),
                year: years.get(&t.race_id).copied(),
                team_name: t.name.clone(),
                company: t.company.clone(),
                bib_number: t.bib_number.clone(),
                rank_final: t.rank_final?,
                time_final_seconds: t.time_final_seconds,
                pace_final_sec_per_km: t.pace_final_sec_per_km,
            })
        })
        .collect();
    ranked.sort_by_key(|t| t.rank_final);
    ranked.truncate(n);
    ranked
}

/// A runner's count of top individual stage finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFinisher {
    pub runner_id: RunnerId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub top_finishes: usize,
    pub best_rank: u32,
}

/// Runners with at least one stage rank ≤ [`TOP_FINISH_RANK`]: most such
/// finishes first, then best rank.
pub fn top_finishers<'a, I>(rows: I) -> Vec<TopFinisher>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut groups: BTreeMap<&RunnerId, TopFinisher> = BTreeMap::new();
    for row in rows {
        let Some(rank) = row.ind_rank_leg.filter(|r| *r <= TOP_FINISH_RANK) else {
            continue;
        };
        let entry = groups.entry(&row.runner_id).or_insert_with(|| TopFinisher {
            runner_id: row.runner_id.clone(),
            first_name: None,
            last_name: None,
            company: None,
            top_finishes: 0,
            best_rank: rank,
        });
        if entry.first_name.is_none() {
            entry.first_name.clone_from(&row.first_name);
        }
        if entry.last_name.is_none() {
            entry.last_name.clone_from(&row.last_name);
        }
        if entry.company.is_none() {
            entry.company.clone_from(&row.company);
        }
        entry.top_finishes += 1;
        entry.best_rank = entry.best_rank.min(rank);
    }

    let mut finishers: Vec<TopFinisher> = groups.into_values().collect();
    finishers.sort_by(|a, b| {
        b.top_finishes
            .cmp(&a.top_finishes)
            .then(a.best_rank.cmp(&b.best_rank))
    });
    finishers
}

/// Fastest individual paces, ascending. Rows without a pace are skipped.
pub fn fastest_stages<'a, I>(rows: I, n: usize) -> Vec<&'a FactRow>
where
    I: IntoIterator<Item = &'a FactRow>,
{
    let mut paced: Vec<&FactRow> = rows
        .into_iter()
        .filter(|r| r.ind_pace_sec_per_km.is_some())
        .collect();
    paced.sort_by(|a, b| {
        let (pa, pb) = (
            a.ind_pace_sec_per_km.unwrap_or(f64::INFINITY),
            b.ind_pace_sec_per_km.unwrap_or(f64::INFINITY),
        );
        pa.total_cmp(&pb)
    });
    paced.truncate(n);
    paced
}

/// Every highlight list at once, over the rows matching `filter`.
#[derive(Debug, Clone, Serialize)]
pub struct Highlights<'a> {
    pub top_distance: Vec<RunnerStats>,
    pub top_starts: Vec<RunnerStats>,
    pub top_teams: Vec<TeamRanking>,
    pub top_finishers: Vec<TopFinisher>,
    pub fastest_stages: Vec<&'a FactRow>,
}

impl<'a> Highlights<'a> {
    /// Team rankings come from the teams table and ignore `filter`.
    pub fn compute(table: &'a FactTable, teams: &[Team], races: &[Race], filter: RunnerFilter) -> Self {
        let rows: Vec<&'a FactRow> = table
            .iter()
            .filter(|r| filter.matches_active(r.active))
            .collect();
        let stats = runner_stats(rows.iter().copied());

        Self {
            top_distance: top_by_distance(&stats, TOP_N),
            top_starts: top_by_starts(&stats, TOP_N),
            top_teams: top_final_team_ranks(teams, races, TOP_TEAMS),
            top_finishers: top_finishers(rows.iter().copied()),
            fastest_stages: fastest_stages(rows.iter().copied(), TOP_N),
        }
    }
}
