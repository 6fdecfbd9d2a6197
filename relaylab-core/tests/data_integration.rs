//! End-to-end: entity files + override document → fact table.

use std::fs;
use std::path::Path;

use relaylab_core::data::{override_snapshot, resolve, Dataset, OverrideStore};
use relaylab_core::domain::{RunnerId, RunnerPatch};
use relaylab_core::{build_fact_table, FactCache, JoinError};

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(format!("{name}.json")), body).unwrap();
}

fn write_dataset(dir: &Path) {
    write(
        dir,
        "races",
        r#"[
            {"race_id": "sola-2023", "year": 2023, "event_name": "SOLA", "num_teams": 900},
            {"race_id": "sola-2024", "year": 2024, "event_name": "SOLA", "num_teams": 950}
        ]"#,
    );
    write(
        dir,
        "legs",
        r#"[
            {"id": "L23-1", "race_id": "sola-2023", "leg_number": 1, "name": "Irchel", "distance_km": 8.2},
            {"id": "L24-1", "race_id": "sola-2024", "leg_number": 1, "name": "Irchel", "distance_km": 8.4},
            {"id": "L24-2", "race_id": "sola-2024", "leg_number": 2, "name": "Zoo", "distance_km": null}
        ]"#,
    );
    write(
        dir,
        "teams",
        r#"[
            {"team_id": "T23", "race_id": "sola-2023", "name": "Optimizers", "company": "Acme", "bib_number": 112, "rank_final": 40},
            {"team_id": "T24", "race_id": "sola-2024", "name": "Optimizers", "company": "Acme", "bib_number": "112", "rank_final": 31}
        ]"#,
    );
    write(
        dir,
        "runners",
        r#"[
            {"runner_id": "R1", "first_name": "Anna", "last_name": "Muster", "company": "Acme", "active": true,
             "zip_code": 8000, "external_ids": {"strava": 1234}},
            {"runner_id": "R2", "first_name": "Beat", "last_name": "Keller", "company": "Acme", "active": true}
        ]"#,
    );
    write(
        dir,
        "results",
        r#"[
            {"runner_id": "R1", "leg_id": "L23-1", "team_id": "T23", "race_id": "sola-2023", "ind_time_seconds": 2900},
            {"runner_id": "R1", "leg_id": "L24-1", "team_id": "T24", "race_id": "sola-2024", "ind_time_seconds": 2850},
            {"runner_id": "R2", "leg_id": "L24-2", "team_id": "T24", "race_id": "sola-2024"},
            {"runner_id": "R9", "leg_id": "L24-9", "team_id": "T24", "race_id": "sola-2024"}
        ]"#,
    );
}

#[test]
fn overrides_flow_into_fact_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    fs::write(
        dir.path().join("runners_overrides.json"),
        r#"{"R1": {"company": null, "active": false}, "GHOST": {"notes": "left"}}"#,
    )
    .unwrap();

    let ds = Dataset::load(dir.path()).unwrap();
    let store = OverrideStore::open(dir.path().join("runners_overrides.json"));
    let runners = resolve(&ds.runners, store.overrides());
    let table = build_fact_table(&ds.races, &ds.legs, &ds.teams, &runners, &ds.results).unwrap();

    assert_eq!(table.len(), ds.results.len());

    let first = &table.rows()[0];
    assert_eq!(first.company, None, "null override clears the runner company");
    assert_eq!(first.team_company.as_deref(), Some("Acme"));
    assert_eq!(first.active, Some(false));
    assert_eq!(first.zip_code.as_deref(), Some("8000"));
    assert_eq!(first.team_bib_number.as_deref(), Some("112"));
    assert_eq!(first.year, Some(2023));

    let unknown_leg = &table.rows()[3];
    assert_eq!(unknown_leg.leg_number, None);
    assert_eq!(unknown_leg.team_name.as_deref(), Some("Optimizers"));

    // GHOST stays visible in the snapshot only.
    let snapshot = override_snapshot(&ds.runners, store.overrides());
    let ids: Vec<&str> = snapshot.iter().map(|r| r.runner_id.as_str()).collect();
    assert_eq!(ids, vec!["GHOST", "R1"]);
    assert_eq!(snapshot[1].company.as_deref(), Some("Acme"));
}

#[test]
fn construction_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let ds = Dataset::load(dir.path()).unwrap();
    let store = OverrideStore::open(dir.path().join("missing.json"));

    let a = build_fact_table(
        &ds.races,
        &ds.legs,
        &ds.teams,
        &resolve(&ds.runners, store.overrides()),
        &ds.results,
    )
    .unwrap();
    let b = build_fact_table(
        &ds.races,
        &ds.legs,
        &ds.teams,
        &resolve(&ds.runners, store.overrides()),
        &ds.results,
    )
    .unwrap();

    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn empty_results_refuse_construction() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    write(dir.path(), "results", "[]");
    let ds = Dataset::load(dir.path()).unwrap();
    let store = OverrideStore::open(dir.path().join("missing.json"));

    let mut cache = FactCache::new();
    let err = cache.get_or_build(&ds, &store).unwrap_err();
    assert_eq!(err, JoinError::MissingData("results"));
}

#[test]
fn saved_overrides_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state/runners_overrides.json");

    let mut store = OverrideStore::open(&path);
    let patch: RunnerPatch = serde_json::from_str(r#"{"tshirt_size": "M", "notes": null}"#).unwrap();
    store.set(RunnerId::new("R2"), patch.clone());
    store.save().unwrap();

    let reopened = OverrideStore::open(&path);
    assert_eq!(reopened.get(&RunnerId::new("R2")), Some(&patch));
    assert_eq!(reopened.generation(), 0);
}
