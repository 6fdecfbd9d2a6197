//! Domain types: races, legs, teams, runners, results.

pub mod de;
pub mod ids;
pub mod race;
pub mod result;
pub mod runner;

pub use ids::{LegId, RaceId, RunnerId, TeamId};
pub use race::{Leg, Race, Team};
pub use result::LegResult;
pub use runner::{EffectiveRunner, Runner, RunnerPatch};
