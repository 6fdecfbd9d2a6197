//! Property tests for reconciliation and join invariants.
//!
//! Uses proptest to verify:
//! 1. Override presence: a present field always wins, null included
//! 2. Pass-through: runners without an entry are unchanged
//! 3. Cardinality: the fact table has exactly one row per result
//! 4. Schedule continuity: without restarts each leg starts where the last ended

use chrono::NaiveDate;
use proptest::prelude::*;
use relaylab_core::data::{resolve, Overrides};
use relaylab_core::domain::{
    Leg, LegId, LegResult, Race, RaceId, Runner, RunnerId, RunnerPatch, Team, TeamId,
};
use relaylab_core::planner::{simulate, PlannedLeg};
use relaylab_core::build_fact_table;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_opt_string() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[A-Za-z]{1,8}")
}

/// Absent, explicit null, or a value.
fn arb_patch_field() -> impl Strategy<Value = Option<Option<String>>> {
    prop_oneof![
        Just(None),
        Just(Some(None)),
        "[A-Za-z]{1,8}".prop_map(|s| Some(Some(s))),
    ]
}

fn arb_runner(id: usize) -> impl Strategy<Value = Runner> {
    (arb_opt_string(), arb_opt_string(), prop::option::of(any::<bool>())).prop_map(
        move |(first, company, active)| {
            let mut r = Runner::bare(RunnerId::new(format!("R{id}")));
            r.first_name = first;
            r.company = company;
            r.active = active;
            r
        },
    )
}

fn arb_runners() -> impl Strategy<Value = Vec<Runner>> {
    (1usize..8).prop_flat_map(|n| (0..n).map(arb_runner).collect::<Vec<_>>())
}

// ── 1 & 2. Override resolution ───────────────────────────────────────

proptest! {
    #[test]
    fn present_override_field_always_wins(
        runners in arb_runners(),
        company in arb_patch_field(),
        notes in arb_patch_field(),
        target in 0usize..8,
    ) {
        let target = target % runners.len();
        let patch = RunnerPatch { company: company.clone(), notes: notes.clone(), ..Default::default() };
        let overrides: Overrides =
            std::iter::once((runners[target].runner_id.clone(), patch)).collect();

        let eff = resolve(&runners, &overrides);
        prop_assert_eq!(eff.len(), runners.len());

        for (i, (base, e)) in runners.iter().zip(&eff).enumerate() {
            if i == target {
                match &company {
                    Some(v) => prop_assert_eq!(&e.company, v),
                    None => prop_assert_eq!(&e.company, &base.company),
                }
                match &notes {
                    Some(v) => prop_assert_eq!(&e.notes, v),
                    None => prop_assert_eq!(&e.notes, &base.notes),
                }
                prop_assert_eq!(&e.first_name, &base.first_name);
            } else {
                prop_assert_eq!(&**e, base);
            }
        }
    }

    #[test]
    fn empty_overrides_are_identity(runners in arb_runners()) {
        let eff = resolve(&runners, &Overrides::new());
        let back: Vec<Runner> = eff.into_iter().map(|e| e.into_inner()).collect();
        prop_assert_eq!(back, runners);
    }
}

// ── 3. Fact table cardinality ────────────────────────────────────────

proptest! {
    #[test]
    fn one_fact_row_per_result(
        picks in prop::collection::vec((0usize..4, 0usize..4, 0usize..3), 1..40),
    ) {
        let race = RaceId::new("r-2024");
        let races = vec![Race { race_id: race.clone(), year: 2024, event_name: None, num_teams: None }];
        let legs: Vec<Leg> = (1..=3)
            .map(|n| Leg {
                leg_id: LegId::new(format!("L{n}")),
                race_id: race.clone(),
                leg_number: n,
                name: None,
                distance_km: Some(n as f64),
            })
            .collect();
        let teams = vec![Team {
            team_id: TeamId::new("T0"),
            race_id: race.clone(),
            name: None,
            company: None,
            bib_number: None,
            rank_final: None,
            time_final_seconds: None,
            pace_final_sec_per_km: None,
        }];
        let runners: Vec<Runner> = (0..3).map(|i| Runner::bare(RunnerId::new(format!("R{i}")))).collect();
        let eff = resolve(&runners, &Overrides::new());

        // Index 3 of runner / leg and 1+ of team dangle on purpose.
        let results: Vec<LegResult> = picks
            .iter()
            .map(|(r, l, t)| {
                LegResult::new(
                    RunnerId::new(format!("R{r}")),
                    LegId::new(format!("L{l}")),
                    TeamId::new(format!("T{t}")),
                    race.clone(),
                )
            })
            .collect();

        let table = build_fact_table(&races, &legs, &teams, &eff, &results).unwrap();
        prop_assert_eq!(table.len(), results.len());
        for (i, row) in table.iter().enumerate() {
            prop_assert_eq!(row.result_index, i);
            prop_assert_eq!(&row.runner_id, &results[i].runner_id);
        }
    }
}

// ── 4. Schedule continuity ───────────────────────────────────────────

proptest! {
    #[test]
    fn legs_chain_without_restarts(
        legs in prop::collection::vec((prop::option::of(0.0..25.0_f64), 150.0..720.0_f64), 1..12),
    ) {
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap().and_hms_opt(7, 30, 0).unwrap();
        let planned: Vec<PlannedLeg> = legs
            .iter()
            .enumerate()
            .map(|(i, (km, pace))| PlannedLeg {
                leg_number: i as u32 + 1,
                leg_name: format!("Stage {}", i + 1),
                distance_km: *km,
                runner_label: None,
                pace_sec_per_km: *pace,
                restart: None,
            })
            .collect();

        let rows = simulate(start, &planned).unwrap();
        prop_assert_eq!(rows.len(), planned.len());
        prop_assert_eq!(rows[0].planned_start, start);
        for pair in rows.windows(2) {
            // Each start is derived from the cumulative sum, so rounding may differ by a millisecond.
            let gap = (pair[1].planned_start - pair[0].planned_finish).num_milliseconds().abs();
            prop_assert!(gap <= 1);
            prop_assert!(pair[1].planned_start >= pair[0].planned_start);
        }
    }
}
