use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use moderator::{Moderator, StepReport};
use tracing::{info, warn};
use werewolf_agents::config::{self, AgentBackend, GameConfig};
use werewolf_agents::prompts::{self, PromptRepository, PROMPT_VERSION};
use werewolf_agents::telemetry::{self, MatchMetrics, DEFAULT_TELEMETRY_LOG};
use werewolf_agents::{server, MatchFactory, MatchRegistry};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Werewolf match moderator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one match to completion and print what happened
    Run {
        #[command(flatten)]
        game: GameArgs,

        /// Also print every stage interaction
        #[arg(long, default_value_t = false)]
        transcript: bool,

        /// Write match metrics as JSON to this file
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Advance a match phase by phase, printing each step report
    Step {
        #[command(flatten)]
        game: GameArgs,

        /// Number of phases to advance (default: until the match ends)
        #[arg(long)]
        steps: Option<u32>,
    },

    /// Start the HTTP control surface
    Serve {
        #[command(flatten)]
        game: GameArgs,

        #[arg(long, default_value = "127.0.0.1:3001")]
        addr: SocketAddr,

        /// JSONL file receiving metrics of every finished match
        #[arg(long, default_value = DEFAULT_TELEMETRY_LOG)]
        telemetry_log: PathBuf,
    },

    /// Inspect prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,

        /// Directory of prompt overrides (overrides WEREWOLF_PROMPTS_DIR)
        #[arg(long)]
        prompts: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum PromptsAction {
    /// List template names
    List,
    /// Render every template against sample metadata
    Check,
}

#[derive(Args, Debug, Clone)]
struct GameArgs {
    /// Match seed (overrides WEREWOLF_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Round cap (overrides WEREWOLF_MAX_ROUNDS)
    #[arg(long)]
    max_rounds: Option<u32>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of prompt overrides (overrides WEREWOLF_PROMPTS_DIR)
    #[arg(long)]
    prompts: Option<PathBuf>,

    /// Agent backend
    #[arg(long, value_enum)]
    agent: Option<AgentBackend>,
}

impl GameArgs {
    fn load(&self) -> Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::from_toml_file(path)?,
            None => GameConfig::default(),
        };
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(max_rounds) = self.max_rounds {
            config.max_rounds = max_rounds;
        }
        if self.prompts.is_some() {
            config.prompts_dir = self.prompts.clone();
        }
        if let Some(agent) = self.agent {
            config.agent = agent;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            game,
            transcript,
            metrics_out,
        } => run(&game, transcript, metrics_out.as_deref()).await,
        Command::Step { game, steps } => step(&game, steps).await,
        Command::Serve {
            game,
            addr,
            telemetry_log,
        } => {
            let config = game.load()?;
            warn_if_chat_unreachable(&config).await;
            let registry = MatchRegistry::new(MatchFactory::new(&config)?)
                .with_telemetry_log(telemetry_log);
            server::serve(addr, Arc::new(registry)).await
        }
        Command::Prompts { action, prompts } => prompts_command(action, prompts),
    }
}

async fn warn_if_chat_unreachable(config: &GameConfig) {
    if config.agent != AgentBackend::Chat {
        return;
    }
    if let Some(chat) = &config.chat {
        if !config::check_endpoint(&chat.url).await {
            warn!(url = %chat.url, "Chat endpoint not reachable; matches will fail at the first decision");
        }
    }
}

async fn new_match(game: &GameArgs) -> Result<(Moderator, u64)> {
    let config = game.load()?;
    warn_if_chat_unreachable(&config).await;
    let factory = MatchFactory::new(&config)?;
    let seed = factory.pick_seed(None);
    info!(
        seed,
        agent = ?config.agent,
        max_rounds = config.max_rounds,
        prompt_version = PROMPT_VERSION,
        "Werewolf match starting"
    );
    Ok((factory.build(seed)?, seed))
}

fn announce(report: &StepReport) {
    let mut line = format!("[round {}] {}", report.round, report.executed);
    if !report.deaths.is_empty() {
        let deaths: Vec<String> = report.deaths.iter().map(|s| format!("seat {s}")).collect();
        line.push_str(&format!(" | deaths: {}", deaths.join(", ")));
    }
    if let Some(seat) = report.lynched {
        line.push_str(&format!(" | lynched: seat {seat}"));
    }
    for shot in &report.shots {
        line.push_str(&format!(" | hunter seat {} shot seat {}", shot.hunter, shot.target));
    }
    println!("{line}");
}

async fn run(game: &GameArgs, transcript: bool, metrics_out: Option<&Path>) -> Result<()> {
    let (mut moderator, seed) = new_match(game).await?;
    let started = Instant::now();

    let reports = moderator
        .run_to_completion()
        .await
        .context("Match aborted")?;
    for report in &reports {
        announce(report);
    }

    println!();
    for entry in moderator.chronicle().global_summary().entries() {
        println!("* {entry}");
    }
    if transcript {
        println!();
        for log in moderator.transcript() {
            if let Some(reply) = &log.reply {
                println!("R{} seat {} {}: {}", log.round, log.seat, log.stage, reply);
            }
        }
    }
    println!();
    match moderator.finish_reason() {
        Some(reason) => println!("Result: {} ({reason})", moderator.result()),
        None => println!("Result: {}", moderator.result()),
    }

    if let Some(path) = metrics_out {
        let metrics = MatchMetrics::from_moderator(
            &format!("cli-{seed}"),
            seed,
            &moderator,
            started.elapsed(),
        );
        telemetry::write_match_metrics(&metrics, path);
    }
    Ok(())
}

async fn step(game: &GameArgs, steps: Option<u32>) -> Result<()> {
    let (mut moderator, _seed) = new_match(game).await?;
    let mut taken = 0;
    while !moderator.is_finished() && steps.map_or(true, |n| taken < n) {
        let report = moderator.step().await.context("Step failed")?;
        println!("{}", serde_json::to_string(&report)?);
        taken += 1;
    }
    println!("{}", serde_json::to_string_pretty(&moderator.status())?);
    Ok(())
}

fn prompts_command(action: PromptsAction, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.or_else(|| GameConfig::default().prompts_dir);
    let repo = PromptRepository::load(dir.as_deref())?;
    match action {
        PromptsAction::List => {
            for name in repo.list() {
                let source = if repo.is_overridden(name) { "override" } else { "built-in" };
                println!("{name}\t{source}");
            }
            Ok(())
        }
        PromptsAction::Check => {
            let failures = repo.check(&prompts::sample_metadata());
            for (name, err) in &failures {
                println!("FAIL {name}: {err}");
            }
            if failures.is_empty() {
                println!("All {} templates render (prompt version {PROMPT_VERSION})", repo.list().len());
                Ok(())
            } else {
                anyhow::bail!("{} template(s) failed to render", failures.len())
            }
        }
    }
}
