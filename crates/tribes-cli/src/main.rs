//! Headless driver for the tribes engine.
//!
//! - `tribes new` - generate a match and print its snapshot as JSON
//! - `tribes playout` - play a seeded random match and print the result
//! - `tribes replay` - rebuild a match from a replay file and check it

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tribes_core::{load_rules, run_playout, GameConfig, GameEngine, Rules, RulesSource};
use tribes_protocol::{
    deserialize_replay_json, serialize_replay_json, serialize_snapshot_json, PlayerId,
};

#[derive(Parser)]
#[command(name = "tribes")]
#[command(about = "Turn-based tribes strategy engine", version)]
struct Cli {
    /// Match config (YAML). Flags below override its fields.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rules file to use instead of the built-in tables
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a match and dump its snapshot
    New {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        players: Option<u32>,

        /// Only what this player can see
        #[arg(long)]
        player: Option<u8>,
    },

    /// Play a match with random legal commands
    Playout {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        players: Option<u32>,

        #[arg(long, default_value_t = 50_000)]
        max_steps: u32,

        /// Write the command log here as a JSON replay
        #[arg(long)]
        replay_out: Option<PathBuf>,
    },

    /// Re-run a JSON replay and report the final state
    Replay {
        path: PathBuf,

        /// Fail unless the final snapshot hash matches
        #[arg(long)]
        expect_hash: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let rules = match &cli.rules {
        Some(path) => load_rules(RulesSource::Path(path.display().to_string()))
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => load_rules(RulesSource::Embedded).context("loading built-in rules")?,
    };
    let base = match &cli.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GameConfig::default(),
    };

    match cli.command {
        Commands::New {
            seed,
            players,
            player,
        } => new_match(with_overrides(base, seed, players)?, rules, player),
        Commands::Playout {
            seed,
            players,
            max_steps,
            replay_out,
        } => playout(
            with_overrides(base, seed, players)?,
            rules,
            max_steps,
            replay_out.as_deref(),
        ),
        Commands::Replay { path, expect_hash } => replay(&path, rules, expect_hash),
    }
}

fn with_overrides(
    mut config: GameConfig,
    seed: Option<u64>,
    players: Option<u32>,
) -> Result<GameConfig> {
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(players) = players {
        config.num_players = players;
    }
    config.validate().context("invalid match config")?;
    Ok(config)
}

fn new_match(config: GameConfig, rules: Rules, player: Option<u8>) -> Result<()> {
    let engine = GameEngine::new(config, rules);
    let snapshot = match player {
        Some(p) => {
            let id = PlayerId(p);
            if engine.state().player(id).is_none() {
                bail!("no player {id} in this match");
            }
            engine.snapshot_for_player(id)
        }
        None => engine.snapshot(),
    };
    println!("{}", serialize_snapshot_json(&snapshot).context("encoding snapshot")?);
    Ok(())
}

fn playout(
    config: GameConfig,
    rules: Rules,
    max_steps: u32,
    replay_out: Option<&Path>,
) -> Result<()> {
    let (engine, result) = run_playout(config, rules, max_steps);

    if let Some(path) = replay_out {
        let json = serialize_replay_json(&engine.export_replay()).context("encoding replay")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing replay to {}", path.display()))?;
        info!(path = %path.display(), commands = engine.command_log().len(), "replay written");
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("encoding playout result")?
    );
    Ok(())
}

fn replay(path: &Path, rules: Rules, expect_hash: Option<u64>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading replay from {}", path.display()))?;
    let file = deserialize_replay_json(&text).context("decoding replay")?;
    let engine = GameEngine::import_replay(&file, rules)
        .with_context(|| format!("replaying {}", path.display()))?;

    let state = engine.state();
    let hash = state.state_hash().context("hashing final state")?;
    info!(
        commands = file.commands.len(),
        turn = state.turn,
        over = engine.is_over(),
        hash,
        "replay verified"
    );
    if let Some(expected) = expect_hash {
        if expected != hash {
            bail!("final hash {hash} does not match expected {expected}");
        }
    }

    let summary = serde_json::json!({
        "commands": file.commands.len(),
        "turn": state.turn,
        "outcome": state.outcome,
        "final_hash": hash,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("encoding summary")?
    );
    Ok(())
}
