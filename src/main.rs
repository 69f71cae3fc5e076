//! CLI driver for the reconnaissance mission planner (spec §6
//! "CLI / library surface (illustrative)"). A thin wrapper over the
//! library: every command reads/writes the JSON contracts from §6 and
//! calls straight into `isr_planner::{orchestrator, mission, io}`.
//!
//! State between invocations (the in-progress mission, including any
//! open/uncommitted segment) lives in a session file next to the
//! mission file; it is a CLI convenience, not one of the documented
//! wire formats — `export`/`import` are what produce/consume those.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use isr_planner::config::SolvePolicy;
use isr_planner::distance::DistanceService;
use isr_planner::domain::{Environment, Mission, VehicleContract};
use isr_planner::error::PlannerError;
use isr_planner::io::wire;
use isr_planner::mission;
use isr_planner::orchestrator;

#[derive(Parser, Debug)]
#[command(name = "isr-planner", version, about = "Multi-vehicle reconnaissance mission planner")]
struct Cli {
    /// Session file tracking the in-progress mission across invocations.
    #[arg(long, global = true, default_value = "mission.session.json")]
    session: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Solve a one-shot environment + contracts into a solution (spec §6 "Solution envelope").
    Solve {
        /// Environment snapshot JSON (spec §6 "Environment snapshot").
        #[arg(long)]
        env: PathBuf,
        /// Vehicle contracts JSON array (spec §6 "Vehicle contract").
        #[arg(long)]
        contracts: PathBuf,
        /// Solve policy JSON; defaults applied for any field omitted.
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Where to write the solution envelope JSON.
        #[arg(long)]
        out: PathBuf,
        /// Also open this as segment 0 of a new segmented mission in `--session`.
        #[arg(long)]
        start_mission: bool,
    },

    /// Cut the open segment at a global distance, freezing its executed prefix (spec §4.8).
    Cut {
        /// Global cut distance along the concatenated mission timeline.
        #[arg(long)]
        dist: f64,
        /// Environment snapshot carrying the *next* segment's threats, for engulfment checks.
        #[arg(long)]
        next_env: Option<PathBuf>,
    },

    /// Accept the open segment in full (no mid-flight cut), closing it at its planned end.
    Accept,

    /// Replan the remainder of the mission from the most recently closed segment (spec §4.8 "Replan").
    Replan {
        /// Environment snapshot for the new segment (targets/threats may have been mutated).
        #[arg(long)]
        env: PathBuf,
        /// Vehicle contracts for the new segment (continuing vehicles must start at their synthetic start).
        #[arg(long)]
        contracts: PathBuf,
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Validate the current mission's invariants (spec §4.8 "Invariant enforcement", §8 property 6).
    Validate,

    /// Export the committed segments as the segmented-mission wire JSON, version 2.0 (spec §6).
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Import a segmented-mission JSON (current or legacy form) as the active mission (spec §6, §9).
    Import {
        #[arg(long)]
        file: PathBuf,
    },

    /// Discard the session, returning to the `EMPTY` mission state.
    Reset,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().compact())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PlannerError> {
    match cli.cmd {
        Commands::Solve { env, contracts, policy, out, start_mission } => {
            let env = load_environment(&env)?;
            let vehicles = load_contracts(&contracts)?;
            let policy = load_policy(policy.as_deref())?;
            let mut svc = DistanceService::new();
            let solution = orchestrator::solve(&env, &vehicles, &policy, &mut svc);
            write_json(&out, &solution)?;
            tracing::info!(
                total_points = solution.metrics.total_points,
                total_length = solution.metrics.total_length,
                "solve complete"
            );

            if start_mission {
                let segment =
                    mission::state::start_first_segment(&env, &vehicles, &policy, &mut svc, Utc::now())?;
                let m = Mission { segments: vec![], open_segment: Some(segment) };
                save_session(&cli.session, &m)?;
                println!("mission started: segment 0 open");
            }
            Ok(())
        }

        Commands::Cut { dist, next_env } => {
            let mut m = load_session(&cli.session)?;
            let open = m
                .open_segment
                .as_mut()
                .ok_or_else(|| PlannerError::InvalidInput("no open segment to cut".into()))?;
            let next_threats = match &next_env {
                Some(path) => load_environment(path)?.threats,
                None => open.threats.clone(),
            };
            let outcome = mission::state::cut(open, dist, &next_threats)?;
            let closed = m.open_segment.take().unwrap();
            m.segments.push(closed);
            save_session(&cli.session, &m)?;

            println!("segment {} closed at distance {dist}", m.segments.last().unwrap().index);
            for (vid, airport) in &outcome.synthetic_starts {
                let escaped = if outcome.escaped.contains(vid) { " (escaped threat)" } else { "" };
                println!(
                    "  {vid}_START -> ({:.3}, {:.3}){escaped}",
                    airport.position.x, airport.position.y
                );
            }
            Ok(())
        }

        Commands::Accept => {
            let mut m = load_session(&cli.session)?;
            let open = m
                .open_segment
                .as_mut()
                .ok_or_else(|| PlannerError::InvalidInput("no open segment to accept".into()))?;
            let max_delta = open.trajectories.values().map(|r| r.delta_distance).fold(0.0_f64, f64::max);
            let end_dist = open.start_dist + max_delta;
            open.end_dist = Some(end_dist);
            open.cut_positions_at_end = Some(
                open.trajectories
                    .iter()
                    .map(|(vid, r)| (vid.clone(), r.end_state.position))
                    .collect(),
            );
            let closed = m.open_segment.take().unwrap();
            println!("segment {} accepted, endDist = {end_dist}", closed.index);
            m.segments.push(closed);
            save_session(&cli.session, &m)?;
            Ok(())
        }

        Commands::Replan { env, contracts, policy } => {
            let mut m = load_session(&cli.session)?;
            let prior = m
                .segments
                .last()
                .ok_or_else(|| PlannerError::InvalidInput("no closed segment to replan from".into()))?;
            let env = load_environment(&env)?;
            let vehicles = load_contracts(&contracts)?;
            let policy = load_policy(policy.as_deref())?;
            let mut svc = DistanceService::new();
            let next = mission::state::replan(prior, &env, &vehicles, &policy, &mut svc, Utc::now())?;
            println!("segment {} open, startDist = {}", next.index, next.start_dist);
            m.open_segment = Some(next);
            save_session(&cli.session, &m)?;
            Ok(())
        }

        Commands::Validate => {
            let m = load_session(&cli.session)?;
            mission::validate_mission(&m)?;
            println!("mission valid: {} closed segment(s), state = {:?}", m.segments.len(), mission::state::state(&m));
            Ok(())
        }

        Commands::Export { out } => {
            let m = load_session(&cli.session)?;
            let json = wire::export_mission(&m).map_err(|e| PlannerError::ImportError(e.to_string()))?;
            fs::write(&out, json).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
            println!("exported {} segment(s) to {}", m.segments.len(), out.display());
            Ok(())
        }

        Commands::Import { file } => {
            let json = fs::read_to_string(&file).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
            let imported = wire::import_mission(&json)?;
            mission::validate_mission(&imported)?;
            save_session(&cli.session, &imported)?;
            println!("imported {} segment(s)", imported.segments.len());
            Ok(())
        }

        Commands::Reset => {
            let path = cli.session;
            if path.exists() {
                fs::remove_file(&path).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
            }
            println!("mission reset to EMPTY");
            Ok(())
        }
    }
}

fn load_environment(path: &PathBuf) -> Result<Environment, PlannerError> {
    let text = fs::read_to_string(path).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
    wire::import_environment(&text).map_err(|e| PlannerError::InvalidInput(e.to_string()))
}

fn load_contracts(path: &PathBuf) -> Result<Vec<VehicleContract>, PlannerError> {
    let text = fs::read_to_string(path).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| PlannerError::InvalidInput(format!("contracts: {e}")))
}

fn load_policy(path: Option<&std::path::Path>) -> Result<SolvePolicy, PlannerError> {
    match path {
        None => Ok(SolvePolicy::default()),
        Some(p) => {
            let text = fs::read_to_string(p).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
            serde_json::from_str(&text).map_err(|e| PlannerError::InvalidInput(format!("policy: {e}")))
        }
    }
}

fn load_session(path: &PathBuf) -> Result<Mission, PlannerError> {
    if !path.exists() {
        return Ok(Mission::default());
    }
    let text = fs::read_to_string(path).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| PlannerError::InvalidInput(format!("session: {e}")))
}

fn save_session(path: &PathBuf, mission: &Mission) -> Result<(), PlannerError> {
    let text = serde_json::to_string_pretty(mission).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
    fs::write(path, text).map_err(|e| PlannerError::InvalidInput(e.to_string()))
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), PlannerError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| PlannerError::InvalidInput(e.to_string()))?;
    fs::write(path, text).map_err(|e| PlannerError::InvalidInput(e.to_string()))
}
