//! Export: CSV, Markdown and Parquet artifacts.
//!
//! Provides:
//! - **CSV**: stage plan, runner overview, override snapshot, full fact table
//! - **Markdown**: a printable stage plan report
//! - **Parquet**: columnar fact table snapshot (written atomically)

use std::fs;
use std::path::Path;

use polars::prelude::*;
use relaylab_core::data::OverrideSnapshotRow;
use relaylab_core::fact::{FactRow, FactTable};
use relaylab_core::format::{format_pace, format_seconds_to_hms};
use relaylab_core::planner::PlanRow;
use tracing::info;

use crate::error::ExportError;
use crate::metrics::RunnerStats;

fn yes_no(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "",
    }
}

fn opt_to_string<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8(data)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

pub const PLAN_COLUMNS: [&str; 10] = [
    "Stage",
    "Stage name",
    "Distance (km)",
    "Runner",
    "Pace (s/km)",
    "Pace",
    "Planned time (hh:mm:ss)",
    "Planned start time",
    "Planned finish time",
    "Restart here",
];

fn plan_cells(r: &PlanRow) -> [String; 10] {
    [
        r.leg_number.to_string(),
        r.leg_name.clone(),
        format!("{:.1}", r.distance_km.unwrap_or(0.0)),
        r.runner_label.clone().unwrap_or_default(),
        format!("{}", r.pace_sec_per_km),
        format_pace(Some(r.pace_sec_per_km)),
        format_seconds_to_hms(Some(r.leg_seconds)),
        r.planned_start.format("%H:%M").to_string(),
        r.planned_finish.format("%H:%M").to_string(),
        if r.is_restart { "Yes" } else { "No" }.to_string(),
    ]
}

/// Stage plan with display-formatted times.
pub fn plan_csv(rows: &[PlanRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(PLAN_COLUMNS)?;
    for r in rows {
        wtr.write_record(plan_cells(r))?;
    }
    finish_csv(wtr)
}

/// Runner overview in display form.
///
/// Columns: runner_id, Name, Company, External, Active, Starts, Years,
/// Total km, Avg. pace, Best individual rank
pub fn runner_overview_csv(stats: &[RunnerStats]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "runner_id",
        "Name",
        "Company",
        "External",
        "Active",
        "Starts",
        "Years",
        "Total km",
        "Avg. pace",
        "Best individual rank",
    ])?;
    for s in stats {
        wtr.write_record([
            s.runner_id.as_str(),
            s.name().as_str(),
            s.company.as_deref().unwrap_or(""),
            yes_no(s.is_external),
            yes_no(s.active),
            s.starts.to_string().as_str(),
            s.years.to_string().as_str(),
            format!("{:.1}", s.total_distance_km).as_str(),
            format_pace(s.mean_pace_sec_per_km).as_str(),
            opt_to_string(s.best_ind_rank).as_str(),
        ])?;
    }
    finish_csv(wtr)
}

/// Merged base + override view, one row per override entry.
pub fn override_snapshot_csv(rows: &[OverrideSnapshotRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    finish_csv(wtr)
}

/// Every fact row with its raw values.
pub fn fact_table_csv(table: &FactTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in table {
        wtr.serialize(row)?;
    }
    finish_csv(wtr)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Stage plan as a Markdown table under `title`.
pub fn plan_markdown(title: &str, rows: &[PlanRow]) -> String {
    let mut md = String::with_capacity(256 + rows.len() * 128);

    md.push_str(&format!("# {title}\n\n"));

    md.push_str(&format!("| {} |\n", PLAN_COLUMNS.join(" | ")));
    md.push_str(&format!("|{}\n", " --- |".repeat(PLAN_COLUMNS.len())));
    for r in rows {
        let cells = plan_cells(r).map(|c| c.replace('|', "\\|"));
        md.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    let total: f64 = rows.iter().map(|r| r.leg_seconds).sum();
    let distance: f64 = rows.iter().filter_map(|r| r.distance_km).sum();
    md.push('\n');
    md.push_str(&format!(
        "Total: {distance:.1} km in {}\n",
        format_seconds_to_hms(Some(total))
    ));
    md
}

// ─── Parquet export ─────────────────────────────────────────────────

fn strings<F>(rows: &[FactRow], f: F) -> Vec<String>
where
    F: Fn(&FactRow) -> &str,
{
    rows.iter().map(|r| f(r).to_string()).collect()
}

fn opt_strings<F>(rows: &[FactRow], f: F) -> Vec<Option<String>>
where
    F: Fn(&FactRow) -> Option<&str>,
{
    rows.iter().map(|r| f(r).map(str::to_string)).collect()
}

fn col<T, F>(rows: &[FactRow], f: F) -> Vec<T>
where
    F: Fn(&FactRow) -> T,
{
    rows.iter().map(f).collect()
}

/// Convert the fact table to a Polars DataFrame, one column per fact field.
pub fn fact_table_dataframe(table: &FactTable) -> Result<DataFrame, ExportError> {
    let rows = table.rows();

    let df = DataFrame::new(vec![
        Column::new("result_index".into(), col(rows, |r| r.result_index as u64)),
        Column::new("runner_id".into(), strings(rows, |r| r.runner_id.as_str())),
        Column::new("leg_id".into(), strings(rows, |r| r.leg_id.as_str())),
        Column::new("team_id".into(), strings(rows, |r| r.team_id.as_str())),
        Column::new("race_id".into(), strings(rows, |r| r.race_id.as_str())),
        Column::new("bib_number".into(), opt_strings(rows, |r| r.bib_number.as_deref())),
        Column::new("ind_time_seconds".into(), col(rows, |r| r.ind_time_seconds)),
        Column::new("ind_pace_sec_per_km".into(), col(rows, |r| r.ind_pace_sec_per_km)),
        Column::new("ind_rank_leg".into(), col(rows, |r| r.ind_rank_leg)),
        Column::new("team_rank_after_leg".into(), col(rows, |r| r.team_rank_after_leg)),
        Column::new(
            "team_time_after_leg_seconds".into(),
            col(rows, |r| r.team_time_after_leg_seconds),
        ),
        Column::new(
            "team_pace_after_leg_sec_per_km".into(),
            col(rows, |r| r.team_pace_after_leg_sec_per_km),
        ),
        Column::new("is_external".into(), col(rows, |r| r.is_external)),
        Column::new("first_name".into(), opt_strings(rows, |r| r.first_name.as_deref())),
        Column::new("last_name".into(), opt_strings(rows, |r| r.last_name.as_deref())),
        Column::new("company".into(), opt_strings(rows, |r| r.company.as_deref())),
        Column::new("email".into(), opt_strings(rows, |r| r.email.as_deref())),
        Column::new("mobile".into(), opt_strings(rows, |r| r.mobile.as_deref())),
        Column::new("street".into(), opt_strings(rows, |r| r.street.as_deref())),
        Column::new("zip_code".into(), opt_strings(rows, |r| r.zip_code.as_deref())),
        Column::new("city".into(), opt_strings(rows, |r| r.city.as_deref())),
        Column::new("country".into(), opt_strings(rows, |r| r.country.as_deref())),
        Column::new("gender".into(), opt_strings(rows, |r| r.gender.as_deref())),
        Column::new("birth_year".into(), col(rows, |r| r.birth_year)),
        Column::new("default_pace_sec".into(), col(rows, |r| r.default_pace_sec)),
        Column::new(
            "preferred_distance".into(),
            opt_strings(rows, |r| r.preferred_distance.as_deref()),
        ),
        Column::new(
            "favorite_stage".into(),
            opt_strings(rows, |r| r.favorite_stage.as_deref()),
        ),
        Column::new("tshirt_size".into(), opt_strings(rows, |r| r.tshirt_size.as_deref())),
        Column::new(
            "food_preference".into(),
            opt_strings(rows, |r| r.food_preference.as_deref()),
        ),
        Column::new("active".into(), col(rows, |r| r.active)),
        Column::new("notes".into(), opt_strings(rows, |r| r.notes.as_deref())),
        Column::new(
            "leg_race_id".into(),
            opt_strings(rows, |r| r.leg_race_id.as_ref().map(|id| id.as_str())),
        ),
        Column::new("leg_number".into(), col(rows, |r| r.leg_number)),
        Column::new("leg_name".into(), opt_strings(rows, |r| r.leg_name.as_deref())),
        Column::new("distance_km".into(), col(rows, |r| r.distance_km)),
        Column::new(
            "team_race_id".into(),
            opt_strings(rows, |r| r.team_race_id.as_ref().map(|id| id.as_str())),
        ),
        Column::new("team_name".into(), opt_strings(rows, |r| r.team_name.as_deref())),
        Column::new("team_company".into(), opt_strings(rows, |r| r.team_company.as_deref())),
        Column::new(
            "team_bib_number".into(),
            opt_strings(rows, |r| r.team_bib_number.as_deref()),
        ),
        Column::new("rank_final".into(), col(rows, |r| r.rank_final)),
        Column::new("time_final_seconds".into(), col(rows, |r| r.time_final_seconds)),
        Column::new(
            "pace_final_sec_per_km".into(),
            col(rows, |r| r.pace_final_sec_per_km),
        ),
        Column::new("year".into(), col(rows, |r| r.year)),
        Column::new("event_name".into(), opt_strings(rows, |r| r.event_name.as_deref())),
        Column::new("num_teams".into(), col(rows, |r| r.num_teams)),
    ])?;
    Ok(df)
}

/// Write the fact table to `path` as Parquet (write to `.tmp`, rename into place).
pub fn write_fact_parquet(table: &FactTable, path: &Path) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut df = fact_table_dataframe(table)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path).map_err(io_err)?;
    if let Err(e) = ParquetWriter::new(file).finish(&mut df) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    // Atomic rename
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })?;

    info!(rows = df.height(), path = %path.display(), "wrote fact table parquet");
    Ok(())
}
