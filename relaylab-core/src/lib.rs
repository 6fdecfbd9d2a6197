//! RelayLab Core: domain types, entity loading, runner overrides, fact join, schedule simulation.
//!
//! This crate contains the data side of the relay analytics engine:
//! - Domain types (races, legs, teams, runners, results) with typed ids
//! - Entity loader for the processed JSON collections
//! - Override store and resolver (presence-based, null-aware field patches)
//! - Fact join engine producing one denormalized row per result
//! - Caller-owned fact cache keyed by dataset fingerprint + override generation
//! - Schedule simulator with restart checkpoints
//!
//! Everything here is synchronous and pure over its inputs, except the
//! override store which owns the one persisted mutable document.

pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod fact;
pub mod filter;
pub mod format;
pub mod planner;

pub use cache::FactCache;
pub use config::{AppConfig, ConfigError, PlanningDefaults};
pub use fact::{build_fact_table, FactRow, FactTable, JoinError};
pub use filter::RunnerFilter;
pub use planner::{simulate, PlanError, PlanRow, PlannedLeg, PlanningSession};
