//! Bot-driven elimination session against the real service.
//!
//! Bots act on every turn: with `idle_rate` the holder lets the turn time out
//! (the manual clock jumps past the deadline), with `skip_rate` they
//! quick-skip when allowed, otherwise they eliminate a random candidate.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use decision_engine::{
    AlgorithmParams, DecisionResult, DecisionService, EngineConfig, ManualClock, MemoryStore,
    StaticDirectory,
};

const GROUP_ID: &str = "simulation";

/// Upper bound on bot actions before giving up
const MAX_STEPS: usize = 10_000;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of candidates
    #[arg(long)]
    pub candidates: u32,

    /// Participant names, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub participants: Vec<String>,

    /// Eliminations per participant (default: first suggestion)
    #[arg(long)]
    pub k: Option<u32>,

    /// Final set size (default: first suggestion)
    #[arg(long)]
    pub m: Option<u32>,

    /// Seed for turn order, the draw and bot behavior
    #[arg(long)]
    pub seed: Option<u64>,

    /// Probability a bot quick-skips when allowed
    #[arg(long, default_value_t = 0.2)]
    pub skip_rate: f64,

    /// Probability a bot lets its turn time out
    #[arg(long, default_value_t = 0.05)]
    pub idle_rate: f64,
}

pub async fn run(mut config: EngineConfig, args: &SimulateArgs) -> Result<DecisionResult> {
    for (name, rate) in [("skip-rate", args.skip_rate), ("idle-rate", args.idle_rate)] {
        if !(0.0..=1.0).contains(&rate) {
            bail!("--{name} must be between 0 and 1, got {rate}");
        }
    }
    if let Some(seed) = args.seed {
        config.rng_seed = Some(seed);
    }
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    let mut bots = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let directory = StaticDirectory::new()
        .with_group(GROUP_ID, args.participants.iter().cloned())
        .shared();
    let timeout = Duration::minutes(i64::from(config.turn_timeout_minutes));
    let service = DecisionService::new(config, MemoryStore::new().shared(), directory)
        .with_clock(clock.clone());

    let n = args.participants.len() as u32;
    let params = match (args.k, args.m) {
        (Some(k), Some(m)) => AlgorithmParams::new(k, n, m, args.candidates),
        _ => {
            let set = service
                .suggest_parameters(args.candidates, n)
                .await
                .context("Failed to suggest parameters")?;
            if set.is_fallback {
                warn!("No viable parameters, trying the fallback suggestion");
            }
            let mut params = set
                .params
                .first()
                .copied()
                .context("suggester returned no parameters")?;
            if let Some(k) = args.k {
                params.k = k;
            }
            if let Some(m) = args.m {
                params.m = m;
            }
            params
        }
    };
    info!(%params, seed, "Starting simulation");

    let candidate_ids = (1..=args.candidates).map(|i| format!("c{i:03}")).collect();
    let session = service
        .create_session(GROUP_ID, candidate_ids, params, None)
        .await
        .context("Failed to create session")?;

    let observer = &args.participants[0];
    let mut status = service.get_status(&session.id, observer).await?;
    let mut steps = 0;
    while status.status.is_active() {
        steps += 1;
        if steps > MAX_STEPS {
            bail!("simulation did not finish within {MAX_STEPS} steps");
        }
        let holder = status
            .current_turn_user
            .clone()
            .context("active session has no turn holder")?;

        if bots.gen_bool(args.idle_rate) {
            debug!(user = %holder, "Bot idles past the deadline");
            clock.advance(timeout + Duration::seconds(1));
            status = service.get_status(&session.id, observer).await?;
            continue;
        }

        let view = service.get_status(&session.id, &holder).await?;
        if view.can_quick_skip && bots.gen_bool(args.skip_rate) {
            debug!(user = %holder, round = view.current_round, "Bot quick-skips");
            status = service.quick_skip(&session.id, &holder).await?;
            continue;
        }

        let pick = bots.gen_range(0..view.current_candidates.len());
        let candidate = view.current_candidates[pick].clone();
        debug!(user = %holder, %candidate, "Bot eliminates");
        status = service.eliminate(&session.id, &holder, &candidate).await?;
    }

    let result = service
        .get_result(&session.id)
        .await?
        .context("session ended without a result")?;
    info!(
        winner = %result.winner,
        forfeited = result.forfeited_turns,
        timeouts = result.timeout_skips,
        steps,
        "Simulation finished"
    );
    Ok(result)
}
