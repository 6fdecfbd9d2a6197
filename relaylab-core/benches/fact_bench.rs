//! Criterion benchmarks for RelayLab hot paths.
//!
//! Benchmarks:
//! 1. Override resolution over the runner collection
//! 2. Fact join at increasing result counts
//! 3. Schedule simulation for a full-length race

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use relaylab_core::data::{resolve, Overrides};
use relaylab_core::domain::{
    Leg, LegId, LegResult, Race, RaceId, Runner, RunnerId, RunnerPatch, Team, TeamId,
};
use relaylab_core::planner::{simulate, PlannedLeg};
use relaylab_core::build_fact_table;

// ── Helpers ──────────────────────────────────────────────────────────

const YEARS: i32 = 10;
const LEGS_PER_RACE: u32 = 14;
const TEAMS_PER_RACE: usize = 20;

struct Fixture {
    races: Vec<Race>,
    legs: Vec<Leg>,
    teams: Vec<Team>,
    runners: Vec<Runner>,
    results: Vec<LegResult>,
}

fn make_fixture(n_runners: usize) -> Fixture {
    let races: Vec<Race> = (0..YEARS)
        .map(|i| Race {
            race_id: RaceId::new(format!("race-{}", 2015 + i)),
            year: 2015 + i,
            event_name: Some("Relay".into()),
            num_teams: Some(TEAMS_PER_RACE as u32),
        })
        .collect();

    let legs: Vec<Leg> = races
        .iter()
        .flat_map(|race| {
            (1..=LEGS_PER_RACE).map(move |n| Leg {
                leg_id: LegId::new(format!("{}-L{n}", race.race_id)),
                race_id: race.race_id.clone(),
                leg_number: n,
                name: Some(format!("Stage {n}")),
                distance_km: Some(4.0 + (n % 5) as f64 * 2.5),
            })
        })
        .collect();

    let teams: Vec<Team> = races
        .iter()
        .flat_map(|race| {
            (0..TEAMS_PER_RACE).map(move |t| Team {
                team_id: TeamId::new(format!("{}-T{t}", race.race_id)),
                race_id: race.race_id.clone(),
                name: Some(format!("Team {t}")),
                company: Some("Acme".into()),
                bib_number: Some(t.to_string()),
                rank_final: Some(t as u32 + 1),
                time_final_seconds: None,
                pace_final_sec_per_km: None,
            })
        })
        .collect();

    let runners: Vec<Runner> = (0..n_runners)
        .map(|i| {
            let mut r = Runner::bare(RunnerId::new(format!("R{i}")));
            r.first_name = Some(format!("First{i}"));
            r.company = Some("Acme".into());
            r
        })
        .collect();

    let results: Vec<LegResult> = legs
        .iter()
        .enumerate()
        .flat_map(|(li, leg)| {
            let runners = &runners;
            (0..TEAMS_PER_RACE).map(move |t| {
                let runner = &runners[(li * TEAMS_PER_RACE + t) % runners.len()];
                let mut res = LegResult::new(
                    runner.runner_id.clone(),
                    leg.leg_id.clone(),
                    TeamId::new(format!("{}-T{t}", leg.race_id)),
                    leg.race_id.clone(),
                );
                res.ind_time_seconds = Some(1500.0 + (li * 7 + t * 13) as f64 % 900.0);
                res
            })
        })
        .collect();

    Fixture {
        races,
        legs,
        teams,
        runners,
        results,
    }
}

fn make_overrides(runners: &[Runner]) -> Overrides {
    runners
        .iter()
        .step_by(10)
        .map(|r| {
            let patch = RunnerPatch {
                company: Some(None),
                active: Some(Some(false)),
                ..Default::default()
            };
            (r.runner_id.clone(), patch)
        })
        .collect()
}

// ── 1. Override resolution ──────────────────────────────────────────

fn bench_resolve(c: &mut Criterion) {
    let fixture = make_fixture(2_000);
    let overrides = make_overrides(&fixture.runners);

    c.bench_function("resolve_2000_runners", |b| {
        b.iter(|| resolve(black_box(&fixture.runners), black_box(&overrides)))
    });
}

// ── 2. Fact join ────────────────────────────────────────────────────

fn bench_fact_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("fact_join");
    for n_runners in [100, 500, 2_000] {
        let fixture = make_fixture(n_runners);
        let eff = resolve(&fixture.runners, &make_overrides(&fixture.runners));
        group.bench_with_input(
            BenchmarkId::from_parameter(fixture.results.len()),
            &fixture,
            |b, f| {
                b.iter(|| {
                    build_fact_table(
                        black_box(&f.races),
                        black_box(&f.legs),
                        black_box(&f.teams),
                        black_box(&eff),
                        black_box(&f.results),
                    )
                })
            },
        );
    }
    group.finish();
}

// ── 3. Schedule simulation ──────────────────────────────────────────

fn bench_simulate(c: &mut Criterion) {
    let start = chrono::NaiveDate::from_ymd_opt(2025, 5, 1)
        .unwrap()
        .and_hms_opt(7, 30, 0)
        .unwrap();
    let legs: Vec<PlannedLeg> = (1..=LEGS_PER_RACE)
        .map(|n| PlannedLeg {
            leg_number: n,
            leg_name: format!("Stage {n}"),
            distance_km: Some(6.5),
            runner_label: None,
            pace_sec_per_km: 330.0,
            restart: (n == 10).then(|| chrono::NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
        })
        .collect();

    c.bench_function("simulate_14_legs", |b| {
        b.iter(|| simulate(black_box(start), black_box(&legs)))
    });
}

criterion_group!(benches, bench_resolve, bench_fact_join, bench_simulate);
criterion_main!(benches);
