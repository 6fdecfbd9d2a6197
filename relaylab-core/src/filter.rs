//! Runner activity filter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Runner;

/// Which runners a listing should include.
///
/// Runners with unknown activity (`active` unset) only match [`RunnerFilter::All`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerFilter {
    #[default]
    All,
    ActiveOnly,
    InactiveOnly,
}

impl RunnerFilter {
    pub fn matches(self, runner: &Runner) -> bool {
        self.matches_active(runner.active)
    }

    /// Match on a bare activity flag, e.g. the `active` column of a fact row.
    pub fn matches_active(self, active: Option<bool>) -> bool {
        match self {
            RunnerFilter::All => true,
            RunnerFilter::ActiveOnly => active == Some(true),
            RunnerFilter::InactiveOnly => active == Some(false),
        }
    }

    /// Keep the matching runners, preserving order.
    pub fn apply<'a, R>(self, runners: &'a [R]) -> Vec<&'a R>
    where
        R: std::ops::Deref<Target = Runner>,
    {
        runners.iter().filter(|r| self.matches(r)).collect()
    }
}

impl fmt::Display for RunnerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunnerFilter::All => "all",
            RunnerFilter::ActiveOnly => "active",
            RunnerFilter::InactiveOnly => "inactive",
        };
        f.write_str(s)
    }
}

impl FromStr for RunnerFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(RunnerFilter::All),
            "active" | "active_only" => Ok(RunnerFilter::ActiveOnly),
            "inactive" | "inactive_only" => Ok(RunnerFilter::InactiveOnly),
            other => Err(format!("unknown runner filter '{other}' (expected all, active, inactive)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{resolve, Overrides};
    use crate::domain::RunnerId;

    fn runner(id: &str, active: Option<bool>) -> Runner {
        let mut r = Runner::bare(RunnerId::new(id));
        r.active = active;
        r
    }

    #[test]
    fn unknown_activity_matches_all_only() {
        let r = runner("R1", None);
        assert!(RunnerFilter::All.matches(&r));
        assert!(!RunnerFilter::ActiveOnly.matches(&r));
        assert!(!RunnerFilter::InactiveOnly.matches(&r));
    }

    #[test]
    fn apply_over_effective_runners() {
        let base = vec![
            runner("R1", Some(true)),
            runner("R2", Some(false)),
            runner("R3", None),
        ];
        let eff = resolve(&base, &Overrides::new());

        let active: Vec<&str> = RunnerFilter::ActiveOnly
            .apply(&eff)
            .iter()
            .map(|r| r.runner_id.as_str())
            .collect();
        assert_eq!(active, vec!["R1"]);
        assert_eq!(RunnerFilter::InactiveOnly.apply(&eff).len(), 1);
        assert_eq!(RunnerFilter::All.apply(&eff).len(), 3);
    }

    #[test]
    fn parses_from_cli_strings() {
        assert_eq!("Active".parse::<RunnerFilter>().unwrap(), RunnerFilter::ActiveOnly);
        assert_eq!("inactive".parse::<RunnerFilter>().unwrap(), RunnerFilter::InactiveOnly);
        assert!("sometimes".parse::<RunnerFilter>().is_err());
    }
}
