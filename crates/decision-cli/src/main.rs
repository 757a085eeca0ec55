//! decision-cli: operator tool for the decision engine
//!
//! - `filter`: evaluate candidates against a filter configuration
//! - `suggest`: propose K/M for a candidate and participant count
//! - `simulate`: run a bot-driven elimination session end to end

mod config;
mod simulate;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use decision_engine::{
    Candidate, EngineConfig, FilterConfiguration, FilterEngine, ParameterSuggester, SuggestionSet,
};

#[derive(Parser)]
#[command(name = "decision-cli")]
#[command(about = "Filter candidates, size and simulate group elimination sessions")]
struct Cli {
    /// Path to an engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply filters and print the report as JSON
    Filter {
        /// JSON array of candidates
        #[arg(long)]
        candidates: PathBuf,

        /// JSON filter configuration
        #[arg(long)]
        filters: PathBuf,

        /// Check time for opening hours and recency (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Print K/N/M suggestions as JSON
    Suggest {
        #[arg(long)]
        candidates: u32,

        #[arg(long)]
        participants: u32,
    },

    /// Run a session with bot participants and print the result as JSON
    Simulate(simulate::SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine_config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Filter {
            candidates,
            filters,
            at,
        } => {
            let candidates: Vec<Candidate> = read_json(&candidates)?;
            let mut configuration: FilterConfiguration = read_json(&filters)?;
            if let Some(at) = at {
                configuration.check_time = Some(at);
            }

            let report = FilterEngine::new()
                .apply(&candidates, &configuration, Utc::now())
                .context("Failed to apply filters")?;
            info!(
                admissible = report.admissible.len(),
                rejected = report.rejected.len(),
                "Filter report ready"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Suggest {
            candidates,
            participants,
        } => {
            let set = suggest(&engine_config, candidates, participants)?;
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
        Command::Simulate(args) => {
            let result = simulate::run(engine_config, &args).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn suggest(config: &EngineConfig, candidates: u32, participants: u32) -> Result<SuggestionSet> {
    if participants == 0 || participants > config.max_participants {
        bail!(
            "--participants must be 1..={}, got {participants}",
            config.max_participants
        );
    }
    let set = ParameterSuggester::with_max_k(config.max_suggested_k)
        .suggest_set(candidates, participants);
    if set.is_fallback {
        tracing::warn!(
            candidates,
            participants,
            "No viable parameters; relax filters or change the group size"
        );
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_rejects_out_of_range_group() {
        let config = EngineConfig::default();
        assert!(suggest(&config, 10, 0).is_err());
        assert!(suggest(&config, 10, 3_000_000_000).is_err());

        let set = suggest(&config, 13, 3).unwrap();
        assert!(!set.is_fallback);
        assert_eq!(set.params[0].k, 3);
    }
}
