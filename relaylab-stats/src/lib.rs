//! RelayLab Stats: runner metrics, head-to-head, rankings, year views, exports.
//!
//! Every function here is a pure view over a built fact table (or slices of
//! its rows): no I/O except in [`export`], no shared state.

pub mod error;
pub mod export;
pub mod head_to_head;
pub mod leaderboard;
pub mod metrics;
pub mod year;

pub use error::{ExportError, StatsError};
pub use head_to_head::{head_to_head, HeadToHead, Matchup, Outcome};
pub use leaderboard::{Highlights, TeamRanking, TopFinisher};
pub use metrics::{runner_stats, runner_summary, BestTeamRank, RunnerStats};
pub use year::{runner_profile, year_overview, RunnerProfile, YearOverview, YearQuery};
