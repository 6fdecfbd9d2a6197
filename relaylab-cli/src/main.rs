//! RelayLab CLI: relay statistics, head-to-head, stage planning and runner overrides.
//!
//! Commands:
//! - `summary`: dataset counts, race years, override state
//! - `year`: one race year (optionally one team or runner)
//! - `runner`: one runner's career
//! - `h2h`: compare two runners on the stages both have run
//! - `overview`: all runners, most starts first
//! - `highlights`: top distance, starts, teams, finishers, fastest stages
//! - `plan`: timetable for a team's next race
//! - `overrides list|set|clear|export`: manage runner corrections
//! - `export-facts`: write the joined fact table as CSV or Parquet

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relaylab_core::config::{parse_clock_time, DEFAULT_CONFIG_FILE, PACE_RANGE_SEC};
use relaylab_core::data::{override_snapshot, read_collection, resolve, Dataset, OverrideStore};
use relaylab_core::domain::{Runner, RunnerId, RunnerPatch, TeamId};
use relaylab_core::format::{format_pace, format_seconds_to_hms};
use relaylab_core::{AppConfig, FactCache, FactTable, PlanningSession, RunnerFilter};
use relaylab_stats::export::{
    fact_table_csv, override_snapshot_csv, plan_csv, plan_markdown, runner_overview_csv,
    write_fact_parquet,
};
use relaylab_stats::leaderboard::runner_overview;
use relaylab_stats::{
    head_to_head, runner_profile, runner_stats, year_overview, Highlights, Outcome, YearQuery,
};

#[derive(Parser)]
#[command(
    name = "relaylab",
    about = "RelayLab: relay race statistics and stage planning",
    version
)]
struct Cli {
    /// TOML config file. A missing file means built-in defaults.
    #[arg(long, global = true, env = "RELAYLAB_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory with races.json, legs.json, teams.json, runners.json, results.json.
    #[arg(long, global = true, env = "RELAYLAB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Runner filter for overview and highlights: all, active, inactive.
    #[arg(long, global = true, default_value = "all")]
    filter: RunnerFilter,

    /// Print JSON instead of tables.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Dataset(DatasetCommand),
    /// Runner override management. Works without the entity files.
    Overrides {
        #[command(subcommand)]
        action: OverrideAction,
    },
}

/// Commands that need every entity collection loaded.
#[derive(Subcommand)]
enum DatasetCommand {
    /// Dataset counts, race years and override state.
    Summary,
    /// Counts, stage distances and results of one race year.
    Year {
        /// Race year. Defaults to the latest year in the dataset.
        #[arg(long)]
        year: Option<i32>,

        /// Restrict to one team id.
        #[arg(long)]
        team: Option<String>,

        /// Restrict to one runner id.
        #[arg(long)]
        runner: Option<String>,
    },
    /// One runner's aggregate stats and every run.
    Runner { runner_id: String },
    /// Compare two runners on the stages both have run.
    H2h { a: String, b: String },
    /// All runners, most starts first, then most years.
    Overview {
        /// Write the overview as CSV instead of printing it.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Top lists: distance, starts, final team ranks, top finishers, fastest stages.
    Highlights,
    /// Leg-by-leg timetable for a team's next race, using the latest race as template.
    Plan {
        /// Team name.
        #[arg(long)]
        team: String,

        /// Planned year. Defaults to the year after the latest race.
        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        bib: Option<String>,

        /// Assign a runner to a stage, e.g. `--runner 3=R17`. Uses the runner's default pace.
        #[arg(long = "runner", value_name = "STAGE=RUNNER_ID")]
        runners: Vec<String>,

        /// Pace for a stage in seconds per km, e.g. `--pace 3=330`.
        #[arg(long = "pace", value_name = "STAGE=SEC_PER_KM")]
        paces: Vec<String>,

        /// Restart the race clock before a stage, e.g. `--restart 10=14:00`.
        #[arg(long = "restart", value_name = "STAGE=HH:MM")]
        restarts: Vec<String>,

        /// Write `<plan>.csv` and `<plan>.md` into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Export the joined fact table.
    ExportFacts {
        #[arg(long, value_enum, default_value_t = FactFormat::Csv)]
        format: FactFormat,

        /// Output file.
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum OverrideAction {
    /// List runners with overrides and the fields they correct.
    List,
    /// Correct fields of a runner, e.g. `set R17 company=Acme active=false email=null`.
    Set {
        runner_id: String,

        /// FIELD=VALUE pairs. `null` clears the field.
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Remove every override of a runner.
    Clear { runner_id: String },
    /// Merged base + override snapshot as CSV.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FactFormat {
    Csv,
    Parquet,
}

/// Loaded inputs plus the fact table built from them.
struct Workspace {
    config: AppConfig,
    dataset: Dataset,
    store: OverrideStore,
    cache: FactCache,
}

fn load_config(config_path: &Path, data_dir: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = AppConfig::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

impl Workspace {
    fn open(config: AppConfig) -> Result<Self> {
        let dataset = Dataset::load(&config.data_dir)
            .with_context(|| format!("failed to load data from {}", config.data_dir.display()))?;
        let store = OverrideStore::open(config.overrides_path());

        Ok(Self {
            config,
            dataset,
            store,
            cache: FactCache::new(),
        })
    }

    fn facts(&mut self) -> Result<(&FactTable, &Dataset)> {
        let table = self
            .cache
            .get_or_build(&self.dataset, &self.store)
            .context("failed to join entity collections")?;
        Ok((table, &self.dataset))
    }
}

/// The override store plus whatever base runners could be read.
struct OverrideWorkspace {
    store: OverrideStore,
    runners: Vec<Runner>,
}

impl OverrideWorkspace {
    fn open(config: &AppConfig) -> Self {
        let runners = read_collection::<Runner>(&config.data_dir, "runners").unwrap_or_else(|e| {
            warn!(error = %e, "base runners unavailable, overrides are shown without them");
            Vec::new()
        });
        Self {
            store: OverrideStore::open(config.overrides_path()),
            runners,
        }
    }

    fn has_base(&self, runner_id: &RunnerId) -> bool {
        self.runners.iter().any(|r| &r.runner_id == runner_id)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relaylab=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli {
        config,
        data_dir,
        filter,
        json,
        command,
    } = Cli::parse();

    let config = load_config(&config, data_dir)?;

    match command {
        Commands::Overrides { action } => {
            let mut ows = OverrideWorkspace::open(&config);
            match action {
                OverrideAction::List => run_overrides_list(&ows, json),
                OverrideAction::Set { runner_id, fields } => {
                    run_overrides_set(&mut ows, RunnerId::new(runner_id), &fields)
                }
                OverrideAction::Clear { runner_id } => {
                    run_overrides_clear(&mut ows, &RunnerId::new(runner_id))
                }
                OverrideAction::Export { out } => run_overrides_export(&ows, out.as_deref()),
            }
        }
        Commands::Dataset(command) => {
            let mut ws = Workspace::open(config)?;
            match command {
                DatasetCommand::Summary => run_summary(&mut ws, json),
                DatasetCommand::Year { year, team, runner } => {
                    run_year(&mut ws, year, team, runner, json)
                }
                DatasetCommand::Runner { runner_id } => run_runner(&mut ws, &runner_id, json),
                DatasetCommand::H2h { a, b } => run_head_to_head(&mut ws, &a, &b, json),
                DatasetCommand::Overview { csv } => {
                    run_overview(&mut ws, filter, csv.as_deref(), json)
                }
                DatasetCommand::Highlights => run_highlights(&mut ws, filter, json),
                DatasetCommand::Plan {
                    team,
                    year,
                    company,
                    bib,
                    runners,
                    paces,
                    restarts,
                    out_dir,
                } => {
                    let mut session = build_plan(&ws, team, year, &runners, &paces, &restarts)?;
                    session.company = company;
                    session.bib_number = bib;
                    run_plan(&ws, &session, out_dir.as_deref(), json)
                }
                DatasetCommand::ExportFacts { format, out } => {
                    run_export_facts(&mut ws, format, &out)
                }
            }
        }
    }
}

// ─── Output helpers ─────────────────────────────────────────────────

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_dash<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn blank_dash(s: String) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s
    }
}

fn km(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Views ──────────────────────────────────────────────────────────

fn run_summary(ws: &mut Workspace, json: bool) -> Result<()> {
    let data_dir = ws.config.data_dir.clone();
    let overrides_path = ws.store.path().to_path_buf();
    let override_count = ws.store.overrides().len();
    let (table, dataset) = ws.facts()?;
    let years = dataset.years();

    if json {
        return print_json(&json!({
            "data_dir": data_dir,
            "races": dataset.races.len(),
            "legs": dataset.legs.len(),
            "teams": dataset.teams.len(),
            "runners": dataset.runners.len(),
            "results": dataset.results.len(),
            "fact_rows": table.len(),
            "years": years,
            "overrides": override_count,
            "overrides_file": overrides_path,
            "fingerprint": dataset.fingerprint(),
        }));
    }

    let years: Vec<String> = years.iter().map(i32::to_string).collect();
    println!();
    println!("=== RelayLab Dataset ===");
    println!("Data dir:   {}", data_dir.display());
    println!("Races:      {}", dataset.races.len());
    println!("Legs:       {}", dataset.legs.len());
    println!("Teams:      {}", dataset.teams.len());
    println!("Runners:    {}", dataset.runners.len());
    println!("Results:    {}", dataset.results.len());
    println!("Fact rows:  {}", table.len());
    println!("Years:      {}", years.join(", "));
    println!("Overrides:  {override_count} ({})", overrides_path.display());
    println!();
    Ok(())
}

fn run_year(
    ws: &mut Workspace,
    year: Option<i32>,
    team: Option<String>,
    runner: Option<String>,
    json: bool,
) -> Result<()> {
    let year = match year {
        Some(y) => y,
        None => ws.dataset.latest_year().context("dataset has no races")?,
    };
    let mut query = YearQuery::new(year);
    if let Some(team) = team {
        query = query.team(TeamId::new(team));
    }
    if let Some(runner) = runner {
        query = query.runner(RunnerId::new(runner));
    }

    let (table, _) = ws.facts()?;
    let overview = year_overview(table, &query);
    if json {
        return print_json(&overview);
    }

    println!();
    println!("=== {year} ===");
    println!(
        "Teams: {}   Runners: {}   Stages: {}   Registered teams: {}",
        overview.teams,
        overview.runners,
        overview.legs,
        or_dash(overview.registered_teams)
    );
    println!(
        "Distance: {:.1} km   Mean pace: {}",
        overview.total_distance_km,
        blank_dash(format_pace(overview.mean_pace_sec_per_km))
    );

    if !overview.stage_distances.is_empty() {
        println!();
        println!("{:>5}  {:<28} {:>8}", "Stage", "Name", "Km");
        for s in &overview.stage_distances {
            println!(
                "{:>5}  {:<28} {:>8}",
                s.leg_number,
                s.leg_name.as_deref().unwrap_or("-"),
                km(s.distance_km)
            );
        }
    }

    if let Some(progression) = &overview.team_rank_progression {
        let ranks: Vec<String> = progression
            .iter()
            .map(|p| format!("{}:{}", p.leg_number, p.team_rank_after_leg))
            .collect();
        println!();
        println!("Team rank after stage: {}", ranks.join("  "));
    }

    println!();
    println!(
        "{:<24} {:>5} {:<26} {:>9} {:>15} {:>5}",
        "Team", "Stage", "Runner", "Time", "Pace", "Rank"
    );
    println!("{}", "-".repeat(90));
    for r in &overview.results {
        println!(
            "{:<24} {:>5} {:<26} {:>9} {:>15} {:>5}",
            r.team_name.as_deref().unwrap_or("-"),
            or_dash(r.leg_number),
            r.runner_name(),
            blank_dash(format_seconds_to_hms(r.ind_time_seconds)),
            blank_dash(format_pace(r.ind_pace_sec_per_km)),
            or_dash(r.ind_rank_leg),
        );
    }
    println!();
    Ok(())
}

fn run_runner(ws: &mut Workspace, runner_id: &str, json: bool) -> Result<()> {
    let runner_id = RunnerId::new(runner_id);
    let (table, dataset) = ws.facts()?;
    if !dataset.runners.iter().any(|r| r.runner_id == runner_id) {
        warn!(runner = %runner_id, "runner not in the base collection");
    }

    let profile = runner_profile(table, &runner_id);
    if json {
        return print_json(&profile);
    }

    let s = &profile.stats;
    println!();
    println!("=== {} ({}) ===", s.name(), s.runner_id);
    println!("Company:        {}", s.company.as_deref().unwrap_or("-"));
    println!("Active:         {}", or_dash(s.active));
    println!("Starts:         {}", s.starts);
    println!("Years:          {}", s.years);
    println!("Distance:       {:.1} km", s.total_distance_km);
    println!("Mean pace:      {}", blank_dash(format_pace(s.mean_pace_sec_per_km)));
    println!("Best stage rank:{}", or_dash(s.best_ind_rank));
    if let Some(best) = &profile.best_final_team_rank {
        println!(
            "Best team rank: {} ({}, {})",
            best.rank_final,
            best.team_name.as_deref().unwrap_or("-"),
            or_dash(best.year)
        );
    }

    if !profile.runs.is_empty() {
        println!();
        println!(
            "{:>4} {:>5} {:<24} {:>6} {:<22} {:>9} {:>15} {:>5}",
            "Year", "Stage", "Name", "Km", "Team", "Time", "Pace", "Rank"
        );
        println!("{}", "-".repeat(98));
        for r in &profile.runs {
            println!(
                "{:>4} {:>5} {:<24} {:>6} {:<22} {:>9} {:>15} {:>5}",
                or_dash(r.year),
                or_dash(r.leg_number),
                r.leg_name.as_deref().unwrap_or("-"),
                km(r.distance_km),
                r.team_name.as_deref().unwrap_or("-"),
                blank_dash(format_seconds_to_hms(r.ind_time_seconds)),
                blank_dash(format_pace(r.ind_pace_sec_per_km)),
                or_dash(r.ind_rank_leg),
            );
        }
    }
    println!();
    Ok(())
}

fn run_head_to_head(ws: &mut Workspace, a: &str, b: &str, json: bool) -> Result<()> {
    let (table, _) = ws.facts()?;
    let h = head_to_head(table.rows(), &RunnerId::new(a), &RunnerId::new(b))?;
    if json {
        return print_json(&h);
    }

    let (name_a, name_b) = (h.a.name(), h.b.name());
    println!();
    println!("=== {name_a} vs {name_b} ===");
    println!("{:<18} {:>20} {:>20}", "", name_a, name_b);
    println!("{:<18} {:>20} {:>20}", "Starts", h.a.stats.starts, h.b.stats.starts);
    println!("{:<18} {:>20} {:>20}", "Years", h.a.stats.years, h.b.stats.years);
    println!(
        "{:<18} {:>20} {:>20}",
        "Distance (km)",
        format!("{:.1}", h.a.stats.total_distance_km),
        format!("{:.1}", h.b.stats.total_distance_km)
    );
    println!(
        "{:<18} {:>20} {:>20}",
        "Mean pace",
        blank_dash(format_pace(h.a.stats.mean_pace_sec_per_km)),
        blank_dash(format_pace(h.b.stats.mean_pace_sec_per_km))
    );
    println!(
        "{:<18} {:>20} {:>20}",
        "Best team rank",
        or_dash(h.a.best_final_team_rank.as_ref().map(|t| t.rank_final)),
        or_dash(h.b.best_final_team_rank.as_ref().map(|t| t.rank_final))
    );

    println!();
    if h.matchups.is_empty() {
        println!("No shared stages.");
        println!();
        return Ok(());
    }

    println!("{:>4} {:>5} {:<24} {:>9} {:>9}  {}", "Year", "Stage", "Name", "A", "B", "Winner");
    println!("{}", "-".repeat(66));
    for m in &h.matchups {
        let winner = match m.outcome {
            Outcome::AWins => name_a.as_str(),
            Outcome::BWins => name_b.as_str(),
            Outcome::Tie => "tie",
            Outcome::NoContest => "-",
        };
        println!(
            "{:>4} {:>5} {:<24} {:>9} {:>9}  {winner}",
            or_dash(m.a.year),
            or_dash(m.a.leg_number),
            m.a.leg_name.as_deref().unwrap_or("-"),
            blank_dash(format_seconds_to_hms(m.a.ind_time_seconds)),
            blank_dash(format_seconds_to_hms(m.b.ind_time_seconds)),
        );
    }
    println!();
    println!(
        "Shared stages: {}   {name_a}: {}   {name_b}: {}   Ties: {}   No contest: {}",
        h.matchups.len(),
        h.a_wins,
        h.b_wins,
        h.ties,
        h.no_contests
    );
    println!();
    Ok(())
}

fn run_overview(ws: &mut Workspace, filter: RunnerFilter, csv: Option<&Path>, json: bool) -> Result<()> {
    let (table, _) = ws.facts()?;
    let overview = runner_overview(runner_stats(
        table.iter().filter(|r| filter.matches_active(r.active)),
    ));

    if let Some(path) = csv {
        write_file(path, &runner_overview_csv(&overview)?)?;
        info!(path = %path.display(), runners = overview.len(), "runner overview written");
        return Ok(());
    }
    if json {
        return print_json(&overview);
    }

    println!();
    println!("=== Runners ({filter}) ===");
    println!(
        "{:<10} {:<26} {:<20} {:>6} {:>5} {:>8} {:>15} {:>5}",
        "Id", "Name", "Company", "Starts", "Years", "Km", "Mean pace", "Best"
    );
    println!("{}", "-".repeat(102));
    for s in &overview {
        println!(
            "{:<10} {:<26} {:<20} {:>6} {:>5} {:>8.1} {:>15} {:>5}",
            s.runner_id.as_str(),
            s.name(),
            s.company.as_deref().unwrap_or("-"),
            s.starts,
            s.years,
            s.total_distance_km,
            blank_dash(format_pace(s.mean_pace_sec_per_km)),
            or_dash(s.best_ind_rank),
        );
    }
    println!();
    Ok(())
}

fn run_highlights(ws: &mut Workspace, filter: RunnerFilter, json: bool) -> Result<()> {
    let (table, dataset) = ws.facts()?;
    let h = Highlights::compute(table, &dataset.teams, &dataset.races, filter);
    if json {
        return print_json(&h);
    }

    println!();
    println!("--- Most distance ({filter}) ---");
    for (i, s) in h.top_distance.iter().enumerate() {
        println!("{:>3}. {:<28} {:>8.1} km", i + 1, s.name(), s.total_distance_km);
    }

    println!();
    println!("--- Most starts ({filter}) ---");
    for (i, s) in h.top_starts.iter().enumerate() {
        println!("{:>3}. {:<28} {:>4} starts in {} years", i + 1, s.name(), s.starts, s.years);
    }

    println!();
    println!("--- Best final team ranks ---");
    for (i, t) in h.top_teams.iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>4}  rank {:>4}  {}",
            i + 1,
            t.team_name.as_deref().unwrap_or("-"),
            or_dash(t.year),
            t.rank_final,
            blank_dash(format_seconds_to_hms(t.time_final_seconds)),
        );
    }

    println!();
    println!("--- Top stage finishes ({filter}) ---");
    for (i, f) in h.top_finishers.iter().enumerate() {
        let name = match (f.first_name.as_deref(), f.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => f.runner_id.to_string(),
        };
        println!("{:>3}. {:<28} {:>3} top finishes, best {}", i + 1, name, f.top_finishes, f.best_rank);
    }

    println!();
    println!("--- Fastest stages ({filter}) ---");
    for (i, r) in h.fastest_stages.iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>15}  {} stage {}",
            i + 1,
            r.runner_name(),
            blank_dash(format_pace(r.ind_pace_sec_per_km)),
            or_dash(r.year),
            or_dash(r.leg_number),
        );
    }
    println!();
    Ok(())
}

// ─── Planning ───────────────────────────────────────────────────────

/// Split `STAGE=VALUE`.
fn parse_stage_assignment<'a>(arg: &'a str, flag: &str) -> Result<(u32, &'a str)> {
    let (stage, value) = arg
        .split_once('=')
        .with_context(|| format!("{flag} expects STAGE=VALUE, got '{arg}'"))?;
    let stage = stage
        .trim()
        .parse::<u32>()
        .with_context(|| format!("{flag}: invalid stage number '{stage}'"))?;
    Ok((stage, value.trim()))
}

fn build_plan(
    ws: &Workspace,
    team: String,
    year: Option<i32>,
    runners: &[String],
    paces: &[String],
    restarts: &[String],
) -> Result<PlanningSession> {
    let latest = ws
        .dataset
        .latest_year()
        .context("dataset has no races to use as a template")?;
    let template = ws
        .dataset
        .race_for_year(latest)
        .with_context(|| format!("no race for {latest}"))?;
    let legs = ws.dataset.legs_for_race(&template.race_id);
    if legs.is_empty() {
        bail!("template race {} has no stages", template.race_id);
    }

    let mut session =
        PlanningSession::from_template(&legs, year.unwrap_or(latest + 1), team, &ws.config.planning)?;
    let effective = resolve(&ws.dataset.runners, ws.store.overrides());

    for arg in runners {
        let (stage, id) = parse_stage_assignment(arg, "--runner")?;
        let runner = effective
            .iter()
            .find(|r| r.runner_id.as_str() == id)
            .with_context(|| format!("unknown runner '{id}'"))?;
        if !session.assign_runner(stage, runner) {
            bail!("no stage {stage} in the {latest} race");
        }
        if let (Some(pace), Some(leg)) = (runner.default_pace_sec, session.leg_mut(stage)) {
            leg.pace_sec_per_km = pace;
        }
    }

    for arg in paces {
        let (stage, value) = parse_stage_assignment(arg, "--pace")?;
        let pace: f64 = value
            .parse()
            .with_context(|| format!("--pace: invalid pace '{value}'"))?;
        if !PACE_RANGE_SEC.contains(&pace) {
            bail!(
                "--pace: pace must be between {} and {} s/km, got {pace}",
                PACE_RANGE_SEC.start(),
                PACE_RANGE_SEC.end()
            );
        }
        session
            .leg_mut(stage)
            .with_context(|| format!("no stage {stage} in the {latest} race"))?
            .pace_sec_per_km = pace;
    }

    for arg in restarts {
        let (stage, value) = parse_stage_assignment(arg, "--restart")?;
        let time = parse_clock_time(value)
            .with_context(|| format!("--restart: invalid time '{value}' (expected HH:MM)"))?;
        session
            .leg_mut(stage)
            .with_context(|| format!("no stage {stage} in the {latest} race"))?
            .restart = Some(time);
    }

    Ok(session)
}

fn run_plan(ws: &Workspace, session: &PlanningSession, out_dir: Option<&Path>, json: bool) -> Result<()> {
    let event_name = ws
        .dataset
        .latest_year()
        .and_then(|y| ws.dataset.race_for_year(y))
        .and_then(|r| r.event_name.clone())
        .unwrap_or_else(|| "Relay".to_string());
    let title = session.title(&event_name);
    let rows = session
        .simulate()
        .context("failed to schedule the plan, check the stage paces")?;

    if let Some(dir) = out_dir {
        let stem = session.file_stem();
        let csv_path = dir.join(format!("{stem}.csv"));
        let md_path = dir.join(format!("{stem}.md"));
        write_file(&csv_path, &plan_csv(&rows)?)?;
        write_file(&md_path, &plan_markdown(&title, &rows))?;
        info!(csv = %csv_path.display(), markdown = %md_path.display(), "plan written");
    }

    if json {
        return print_json(&json!({ "title": title, "session": session, "rows": rows }));
    }

    println!();
    println!("=== {title} ===");
    println!("Start: {}", session.race_start.format("%Y-%m-%d %H:%M"));
    println!();
    println!(
        "{:>5} {:<24} {:>6} {:<26} {:>15} {:>9} {:>6} {:>6} {:>3}",
        "Stage", "Name", "Km", "Runner", "Pace", "Time", "Start", "Finish", "R"
    );
    println!("{}", "-".repeat(110));
    for r in &rows {
        println!(
            "{:>5} {:<24} {:>6} {:<26} {:>15} {:>9} {:>6} {:>6} {:>3}",
            r.leg_number,
            r.leg_name,
            km(r.distance_km),
            r.runner_label.as_deref().unwrap_or("-"),
            format_pace(Some(r.pace_sec_per_km)),
            format_seconds_to_hms(Some(r.leg_seconds)),
            r.planned_start.format("%H:%M").to_string(),
            r.planned_finish.format("%H:%M").to_string(),
            if r.is_restart { "*" } else { "" },
        );
    }
    let total: f64 = rows.iter().map(|r| r.leg_seconds).sum();
    println!();
    println!(
        "Total: {:.1} km in {}",
        session.total_distance_km(),
        blank_dash(format_seconds_to_hms(Some(total)))
    );
    println!();
    Ok(())
}

// ─── Overrides ──────────────────────────────────────────────────────

/// Override fields whose values are not strings.
const TYPED_FIELDS: &[&str] = &["birth_year", "default_pace_sec", "active"];

/// Build a patch from `FIELD=VALUE` pairs. `null` clears a field.
fn parse_patch(assignments: &[String]) -> Result<RunnerPatch> {
    let mut map = serde_json::Map::new();
    for assignment in assignments {
        let (field, raw) = assignment
            .split_once('=')
            .with_context(|| format!("expected FIELD=VALUE, got '{assignment}'"))?;
        let field = field.trim();
        if !RunnerPatch::FIELDS.contains(&field) {
            bail!(
                "unknown runner field '{field}'. Valid: {}",
                RunnerPatch::FIELDS.join(", ")
            );
        }

        let value = if raw == "null" {
            Value::Null
        } else if TYPED_FIELDS.contains(&field) {
            serde_json::from_str(raw)
                .with_context(|| format!("invalid value for {field}: '{raw}'"))?
        } else {
            Value::String(raw.to_string())
        };
        map.insert(field.to_string(), value);
    }
    serde_json::from_value(Value::Object(map)).context("invalid override values")
}

fn run_overrides_list(ws: &OverrideWorkspace, json: bool) -> Result<()> {
    let overrides = ws.store.overrides();
    if json {
        return print_json(overrides);
    }

    if overrides.is_empty() && overrides.rejected().next().is_none() {
        println!("No overrides in {}", ws.store.path().display());
        return Ok(());
    }

    println!();
    println!("Overrides: {} ({})", overrides.len(), ws.store.path().display());
    println!();
    println!("{:<12} {:<8} {}", "Runner", "Base", "Fields");
    println!("{}", "-".repeat(60));
    for (runner_id, patch) in overrides.iter() {
        println!(
            "{:<12} {:<8} {}",
            runner_id.as_str(),
            if ws.has_base(runner_id) { "yes" } else { "missing" },
            patch.present_fields().join(", ")
        );
    }
    for (runner_id, _) in overrides.rejected() {
        println!("{:<12} {:<8} {}", runner_id.as_str(), "invalid", "kept as is, fix it in the file");
    }
    println!();
    Ok(())
}

fn run_overrides_set(ws: &mut OverrideWorkspace, runner_id: RunnerId, fields: &[String]) -> Result<()> {
    let patch = parse_patch(fields)?;
    if !ws.has_base(&runner_id) {
        warn!(runner = %runner_id, "storing override for a runner not in the base collection");
    }

    let changed = patch.present_fields().join(", ");
    ws.store.update(runner_id.clone(), patch);
    ws.store.save().context("failed to save overrides")?;
    println!("Updated {runner_id}: {changed}");
    Ok(())
}

fn run_overrides_clear(ws: &mut OverrideWorkspace, runner_id: &RunnerId) -> Result<()> {
    if ws.store.remove(runner_id).is_none() {
        println!("No overrides for {runner_id}.");
        return Ok(());
    }
    ws.store.save().context("failed to save overrides")?;
    println!("Cleared overrides for {runner_id}.");
    Ok(())
}

fn run_overrides_export(ws: &OverrideWorkspace, out: Option<&Path>) -> Result<()> {
    let snapshot = override_snapshot(&ws.runners, ws.store.overrides());
    let csv = override_snapshot_csv(&snapshot)?;
    match out {
        Some(path) => {
            write_file(path, &csv)?;
            info!(path = %path.display(), rows = snapshot.len(), "override snapshot written");
        }
        None => print!("{csv}"),
    }
    Ok(())
}

// ─── Export ─────────────────────────────────────────────────────────

fn run_export_facts(ws: &mut Workspace, format: FactFormat, out: &Path) -> Result<()> {
    let (table, _) = ws.facts()?;
    match format {
        FactFormat::Csv => write_file(out, &fact_table_csv(table)?)?,
        FactFormat::Parquet => write_fact_parquet(table, out)
            .with_context(|| format!("failed to write {}", out.display()))?,
    }
    println!("Wrote {} fact rows to {}", table.len(), out.display());
    Ok(())
}
