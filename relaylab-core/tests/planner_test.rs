//! Schedule simulator scenarios.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use relaylab_core::planner::{simulate, PlannedLeg};

fn race_day(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn two_legs() -> Vec<PlannedLeg> {
    vec![
        PlannedLeg {
            leg_number: 1,
            leg_name: "Stage 1".into(),
            distance_km: Some(10.0),
            runner_label: None,
            pace_sec_per_km: 360.0,
            restart: None,
        },
        PlannedLeg {
            leg_number: 2,
            leg_name: "Stage 2".into(),
            distance_km: Some(5.0),
            runner_label: Some("Anna Muster (R1)".into()),
            pace_sec_per_km: 360.0,
            restart: None,
        },
    ]
}

#[test]
fn consecutive_legs_chain_without_gaps() {
    let rows = simulate(race_day(7, 30), &two_legs()).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].planned_start, race_day(7, 30));
    assert_eq!(rows[0].planned_finish, race_day(9, 0));
    assert_eq!(rows[1].planned_start, race_day(9, 0));
    assert_eq!(rows[1].planned_finish, race_day(9, 30));
    assert_eq!(rows[0].leg_seconds, 3600.0);
    assert_eq!(rows[1].runner_label.as_deref(), Some("Anna Muster (R1)"));
}

#[test]
fn restart_resets_base_and_cumulative() {
    let mut legs = two_legs();
    legs[1].restart = Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap());

    let rows = simulate(race_day(7, 30), &legs).unwrap();

    assert_eq!(rows[0].planned_start, race_day(7, 30));
    assert_eq!(rows[0].planned_finish, race_day(9, 0));
    assert_eq!(rows[1].planned_start, race_day(10, 0));
    assert_eq!(rows[1].planned_finish, race_day(10, 30));
    assert!(rows[1].is_restart);
}

#[test]
fn legs_after_a_restart_continue_from_it() {
    let mut legs = two_legs();
    legs[0].restart = Some(NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    legs.push(PlannedLeg {
        leg_number: 3,
        leg_name: "Stage 3".into(),
        distance_km: Some(2.5),
        runner_label: None,
        pace_sec_per_km: 240.0,
        restart: None,
    });

    let rows = simulate(race_day(7, 30), &legs).unwrap();
    assert_eq!(rows[0].planned_start, race_day(6, 0));
    assert_eq!(rows[2].planned_start, race_day(8, 0));
    assert_eq!(rows[2].planned_finish, race_day(8, 10));
}

#[test]
fn output_order_follows_input_order() {
    let mut legs = two_legs();
    legs.reverse();
    let rows = simulate(race_day(7, 30), &legs).unwrap();
    let order: Vec<u32> = rows.iter().map(|r| r.leg_number).collect();
    assert_eq!(order, vec![2, 1]);
    assert_eq!(rows[0].planned_finish, race_day(8, 0));
}

#[test]
fn empty_plan_is_empty() {
    assert!(simulate(race_day(7, 30), &[]).unwrap().is_empty());
}
