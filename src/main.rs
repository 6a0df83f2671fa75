//! Command line entry point for skillmeter
//!
//! Runs the rating flows against JSON problem and solve files using the
//! in-memory collaborators, printing results as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skillmeter::config::AppConfig;
use skillmeter::events::LoggingEventPublisher;
use skillmeter::rating::calculate_partial_credit;
use skillmeter::service::{Collaborators, RatingService};
use skillmeter::storage::InMemoryStore;
use skillmeter::{Problem, Solve, StaticProblemCatalog, UserRating};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Username the CLI stores records under
const CLI_USER: &str = "cli";

/// Skillmeter - Glicko-2 ratings for timed problem practice
#[derive(Parser)]
#[command(
    name = "skillmeter",
    version,
    about = "Glicko-2 skill estimation, calibration and rating sync",
    long_about = "Skillmeter estimates per-category Glicko-2 ratings from solve history, \
                 selects calibration problems, and grades timed attempts with partial credit."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Seed for jitter and shuffling
    #[arg(long, value_name = "SEED", help = "Seed the random source for reproducible output")]
    seed: Option<u64>,

    /// Print Prometheus metrics after the command
    #[arg(long, help = "Print collected metrics in Prometheus text format")]
    metrics: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running a command")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate ratings from a solve history
    Estimate {
        /// JSON array of problems
        #[arg(long, value_name = "FILE")]
        problems: PathBuf,
        /// JSON array of solves
        #[arg(long, value_name = "FILE")]
        solves: PathBuf,
    },

    /// Select calibration problems
    Select {
        #[arg(long, value_name = "FILE")]
        problems: PathBuf,
        /// JSON array of solves; accepted ones are excluded
        #[arg(long, value_name = "FILE")]
        solves: Option<PathBuf>,
    },

    /// Time limit and partial credit for one timed attempt
    Credit {
        /// Seconds spent
        #[arg(long)]
        time_used: f64,
        #[arg(long)]
        problem_rating: Option<f64>,
        /// The attempt was not finished
        #[arg(long)]
        incomplete: bool,
    },

    /// One rating step against a problem
    Update {
        #[arg(long, default_value_t = 1500.0)]
        rating: f64,
        #[arg(long, default_value_t = 350.0)]
        rd: f64,
        #[arg(long, default_value_t = 0.06)]
        volatility: f64,
        #[arg(long)]
        problem_rating: f64,
        /// Outcome score in [0, 1]
        #[arg(long)]
        outcome: f64,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    skillmeter::config::validate_config(&config)?;
    Ok(config)
}

/// Display configuration summary
fn display_banner(config: &AppConfig) {
    info!("Skillmeter {}", skillmeter::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Tau: {}, decay: {}/period",
        config.rating.tau, config.rating.decay_constant
    );
    info!(
        "   Time limit: {} min",
        config.rating.base_time_limit_minutes
    );
    info!(
        "   Calibration: {} problems in [{}, {}]",
        config.calibration.problem_count,
        config.calibration.min_problem_rating,
        config.calibration.max_problem_rating
    );
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_service(
    config: &AppConfig,
    problems: Vec<Problem>,
    solves: Vec<Solve>,
) -> Result<RatingService> {
    let catalog = Arc::new(StaticProblemCatalog::new(problems));
    catalog.set_history(CLI_USER, solves)?;

    let service = RatingService::new(
        config.clone(),
        Collaborators {
            store: Arc::new(InMemoryStore::new()),
            catalog,
            publisher: Arc::new(LoggingEventPublisher),
        },
    )
    .await?;
    Ok(service)
}

async fn run(args: &Args, config: &AppConfig, rng: &mut StdRng) -> Result<Option<RatingService>> {
    let Some(command) = &args.command else {
        info!("No command given; use --help to list commands");
        return Ok(None);
    };

    match command {
        Command::Estimate { problems, solves } => {
            let service = build_service(config, read_json(problems)?, read_json(solves)?).await?;
            let ratings = service.initialize_from_history(CLI_USER, rng).await?;
            print_json(&ratings)?;
            Ok(Some(service))
        }
        Command::Select { problems, solves } => {
            let solves = match solves {
                Some(path) => read_json(path)?,
                None => Vec::new(),
            };
            let service = build_service(config, read_json(problems)?, solves).await?;
            let started = service.calibration().start(CLI_USER, rng).await?;
            print_json(&started.problems)?;
            Ok(Some(service))
        }
        Command::Credit {
            time_used,
            problem_rating,
            incomplete,
        } => {
            let time_limit = skillmeter::rating::determine_time_limit(
                *problem_rating,
                config.rating.base_time_limit_minutes,
            );
            let credit = calculate_partial_credit(*time_used, f64::from(time_limit), !incomplete);
            print_json(&serde_json::json!({
                "time_limit": time_limit,
                "time_used": time_used,
                "completed": !incomplete,
                "partial_credit": credit,
            }))?;
            Ok(None)
        }
        Command::Update {
            rating,
            rd,
            volatility,
            problem_rating,
            outcome,
        } => {
            let engine = skillmeter::Glicko2Engine::new(config.rating.clone())?;
            let current = UserRating {
                rating: *rating,
                rd: *rd,
                volatility: *volatility,
                last_updated: None,
                solve_count: 0,
            };
            let updated = engine.update_rating(&current, *problem_rating, *outcome)?;
            print_json(&updated)?;
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful");
        return Ok(());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let service = match run(&args, &config, &mut rng).await {
        Ok(service) => service,
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if args.metrics {
        match service {
            Some(service) => print!("{}", service.metrics().render()?),
            None => info!("No metrics recorded for this command"),
        }
    }

    Ok(())
}
