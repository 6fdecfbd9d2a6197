//! Schedule simulator: leg-by-leg timetable for a planned race.
//!
//! The clock runs from a base time plus the cumulative planned duration of
//! the legs since that base. A restart checkpoint on a leg moves the base to
//! the restart time (same race date) and zeroes the cumulative counter
//! before that leg is scheduled. Restarts are taken as given: they may move
//! the clock backwards. Paces are not checked for plausibility; a schedule
//! that leaves the representable date range is an error.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, PlanningDefaults};
use crate::domain::{Leg, Runner};

/// Per-leg planning input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLeg {
    pub leg_number: u32,
    pub leg_name: String,
    pub distance_km: Option<f64>,
    pub runner_label: Option<String>,
    pub pace_sec_per_km: f64,
    /// Restart the race clock at this time before the leg.
    pub restart: Option<NaiveTime>,
}

impl PlannedLeg {
    pub fn from_leg(leg: &Leg, pace_sec_per_km: f64) -> Self {
        Self {
            leg_number: leg.leg_number,
            leg_name: leg
                .name
                .clone()
                .unwrap_or_else(|| format!("Stage {}", leg.leg_number)),
            distance_km: leg.distance_km,
            runner_label: None,
            pace_sec_per_km,
            restart: None,
        }
    }

    /// Planned duration: pace × distance, zero when the distance is unset or zero.
    pub fn leg_seconds(&self) -> f64 {
        match self.distance_km {
            Some(d) if d != 0.0 => self.pace_sec_per_km * d,
            _ => 0.0,
        }
    }
}

/// One scheduled leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub leg_number: u32,
    pub leg_name: String,
    pub distance_km: Option<f64>,
    pub runner_label: Option<String>,
    pub pace_sec_per_km: f64,
    pub leg_seconds: f64,
    pub planned_start: NaiveDateTime,
    pub planned_finish: NaiveDateTime,
    pub is_restart: bool,
}

/// Errors from scheduling a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planned time for stage {leg_number} is out of range (pace {pace_sec_per_km} s/km)")]
    OutOfRange { leg_number: u32, pace_sec_per_km: f64 },
}

fn offset(seconds: f64) -> Option<Duration> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

fn shift(at: NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    at.checked_add_signed(offset(seconds)?)
}

/// Schedule `legs` in the given order starting at `race_start`.
pub fn simulate(race_start: NaiveDateTime, legs: &[PlannedLeg]) -> Result<Vec<PlanRow>, PlanError> {
    let race_date = race_start.date();
    let mut base = race_start;
    let mut cumulative = 0.0_f64;

    legs.iter()
        .map(|leg| {
            if let Some(t) = leg.restart {
                base = race_date.and_time(t);
                cumulative = 0.0;
            }

            let out_of_range = || PlanError::OutOfRange {
                leg_number: leg.leg_number,
                pace_sec_per_km: leg.pace_sec_per_km,
            };
            let leg_seconds = leg.leg_seconds();
            let planned_start = shift(base, cumulative).ok_or_else(out_of_range)?;
            let planned_finish = shift(planned_start, leg_seconds).ok_or_else(out_of_range)?;
            cumulative += leg_seconds;

            Ok(PlanRow {
                leg_number: leg.leg_number,
                leg_name: leg.leg_name.clone(),
                distance_km: leg.distance_km,
                runner_label: leg.runner_label.clone(),
                pace_sec_per_km: leg.pace_sec_per_km,
                leg_seconds,
                planned_start,
                planned_finish,
                is_restart: leg.restart.is_some(),
            })
        })
        .collect()
}

/// Label shown for an assigned runner: `"First Last (runner_id)"`.
pub fn runner_label(runner: &Runner) -> String {
    let name = [runner.first_name.as_deref(), runner.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        format!("({})", runner.runner_id)
    } else {
        format!("{name} ({})", runner.runner_id)
    }
}

/// A team's plan for a future race, built from a template race's legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningSession {
    pub planned_year: i32,
    pub team_name: String,
    pub company: Option<String>,
    pub bib_number: Option<String>,
    pub race_start: NaiveDateTime,
    pub legs: Vec<PlannedLeg>,
}

impl PlanningSession {
    /// Every template leg gets the default pace, no runner and no restart.
    /// Legs are ordered by leg number.
    pub fn from_template(
        template_legs: &[&Leg],
        planned_year: i32,
        team_name: impl Into<String>,
        defaults: &PlanningDefaults,
    ) -> Result<Self, ConfigError> {
        let race_start = defaults
            .race_date(planned_year)?
            .and_time(defaults.start_time()?);

        let mut legs: Vec<PlannedLeg> = template_legs
            .iter()
            .map(|leg| PlannedLeg::from_leg(leg, defaults.default_pace_sec))
            .collect();
        legs.sort_by_key(|l| l.leg_number);

        Ok(Self {
            planned_year,
            team_name: team_name.into(),
            company: None,
            bib_number: None,
            race_start,
            legs,
        })
    }

    pub fn leg_mut(&mut self, leg_number: u32) -> Option<&mut PlannedLeg> {
        self.legs.iter_mut().find(|l| l.leg_number == leg_number)
    }

    /// Assign `runner` to a leg. Returns false if the leg does not exist.
    pub fn assign_runner(&mut self, leg_number: u32, runner: &Runner) -> bool {
        match self.leg_mut(leg_number) {
            Some(leg) => {
                leg.runner_label = Some(runner_label(runner));
                true
            }
            None => false,
        }
    }

    pub fn total_distance_km(&self) -> f64 {
        self.legs.iter().filter_map(|l| l.distance_km).sum()
    }

    pub fn simulate(&self) -> Result<Vec<PlanRow>, PlanError> {
        simulate(self.race_start, &self.legs)
    }

    pub fn title(&self, event_name: &str) -> String {
        format!("{event_name} Plan {} - {}", self.planned_year, self.team_name)
    }

    /// File stem for exports, e.g. `plan_2025_Night_Owls`.
    pub fn file_stem(&self) -> String {
        format!("plan_{}_{}", self.planned_year, self.team_name.replace(' ', "_"))
    }
}
