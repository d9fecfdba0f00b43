use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use taskrank_core::{
    Engine, FEATURE_NAMES, ScoringArtifact, Task, extract_features, handle_request_annotated,
    now_in, validate_features,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod input;
mod state;

#[derive(Parser, Debug)]
#[command(name = "taskrank", version, about = "Dependency-aware task prioritization")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank a batch of tasks (JSON request body, JSON array, or CSV)
    Rank {
        /// Batch file; `.csv` is read as CSV, anything else as JSON
        #[arg(long)]
        input: PathBuf,

        /// Completed task ids, comma separated (replaces any in the file)
        #[arg(long, value_delimiter = ',')]
        completed: Vec<String>,

        /// Scoring artifact (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,

        /// IANA timezone for "now" (overrides config)
        #[arg(long)]
        timezone: Option<String>,

        /// Print at most this many ranked tasks
        #[arg(long)]
        limit: Option<usize>,

        /// Also list blocked and errored tasks
        #[arg(long)]
        show_excluded: bool,

        /// Print the response body as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature vector derived for each task (no model needed)
    Features {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        timezone: Option<String>,
    },

    /// Write a default ~/.taskrank/config.toml
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    init_tracing(&cfg.log.filter);

    match cli.command {
        Command::Rank {
            input,
            completed,
            model,
            timezone,
            limit,
            show_excluded,
            json,
        } => {
            let tz = timezone.unwrap_or_else(|| cfg.engine.timezone.clone());
            let artifact = match model {
                Some(p) => p,
                None => cfg.artifact_path()?,
            };
            let engine = build_engine(&artifact, &tz)?;

            let mut body = input::load_batch(&input)?;
            if !completed.is_empty() {
                input::set_completed(&mut body, &completed)?;
            }

            rank(&engine, body, limit, show_excluded, json)?;
        }

        Command::Features { input, timezone } => {
            let tz = timezone.unwrap_or_else(|| cfg.engine.timezone.clone());
            let body = input::load_batch(&input)?;
            print_features(&body, &tz)?;
        }

        Command::InitConfig => {
            config::init_config()?;
        }
    }

    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the scoring artifact once. A missing file leaves the engine up but
/// unable to score; a file that exists but does not load is a hard error.
fn build_engine(artifact: &Path, tz: &str) -> Result<Engine> {
    let tz = config::parse_timezone(tz)?;

    let engine = if artifact.exists() {
        let loaded = ScoringArtifact::load(artifact)
            .with_context(|| format!("loading {}", artifact.display()))?;
        let engine = Engine::from_artifact(loaded)
            .with_context(|| format!("validating {}", artifact.display()))?;
        info!(artifact = %artifact.display(), features = ?engine.feature_names(), "scorer loaded");
        engine
    } else {
        warn!(artifact = %artifact.display(), "no scoring artifact; requests will be refused");
        Engine::unavailable(format!(
            "no scoring artifact at {} (pass --model <path>)",
            artifact.display()
        ))
    };

    Ok(engine.with_timezone(tz))
}

fn rank(
    engine: &Engine,
    body: Value,
    limit: Option<usize>,
    show_excluded: bool,
    json: bool,
) -> Result<()> {
    let (response, annotated) = match handle_request_annotated(engine, body) {
        Ok(out) => out,
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&e.to_body(engine))?);
            }
            bail!("{e}");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let shown = limit.unwrap_or(response.prioritized_tasks.len());
    println!(
        "# Ranked tasks ({} of {})\n",
        response.prioritized_tasks.len(),
        annotated.len()
    );
    for (i, t) in response.prioritized_tasks.iter().take(shown).enumerate() {
        println!(
            "{:>3}. score={:.3} | {} | deadline={}",
            i + 1,
            t.score.unwrap_or_default(),
            t.label(),
            t.deadline
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or("-"),
        );
    }

    if show_excluded {
        let excluded: Vec<&Task> = annotated.iter().filter(|t| !t.is_ranked()).collect();
        println!("\n## Excluded ({})\n", excluded.len());
        for t in excluded {
            match &t.error {
                Some(err) => println!("- {} | error: {}", t.label(), err),
                None => println!(
                    "- {} | status={} | deps={}",
                    t.label(),
                    t.status_str().unwrap_or("-"),
                    join_ids(t),
                ),
            }
        }
    }

    println!("\nFeature set: {}", response.feature_set.join(", "));
    Ok(())
}

fn join_ids(t: &Task) -> String {
    t.dependency_ids()
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn print_features(body: &Value, tz: &str) -> Result<()> {
    let now = now_in(config::parse_timezone(tz)?);
    println!("# Features (now = {now}, tz = {tz})\n");
    println!("task | {}", FEATURE_NAMES.join(" | "));

    for raw in input::raw_tasks(body) {
        let task = Task::from(raw);
        let v = extract_features(&task, now);
        let cells: Vec<String> = v
            .values()
            .iter()
            .map(|f| match f.as_f64() {
                Some(x) => x.to_string(),
                None => format!("{f:?}"),
            })
            .collect();
        let flag = if validate_features(&v) { "" } else { "  (invalid)" };
        println!("{} | {}{}", task.label(), cells.join(" | "), flag);
    }
    Ok(())
}
