//! Agent implementations and the factory that seats them at a new match.
//!
//! The `MatchFactory` ties together the `GameConfig`, the prompt repository
//! and an [`AgentSource`] to build ready-to-step moderators.

pub mod chat;
pub mod rule_based;

use std::sync::Arc;

use anyhow::{Context, Result};
use moderator::{AgentPort, MatchRng, Moderator, SeatConfig};
use tracing::info;

use crate::config::{AgentBackend, GameConfig};
use crate::prompts::PromptRepository;
use chat::ChatAgent;
use rule_based::RuleBasedAgent;

/// Builds the agent port for one match.
pub trait AgentSource: Send + Sync {
    /// `rng` is the match's own RNG handle.
    fn agent_for(&self, plan: &[SeatConfig], rng: &MatchRng) -> Result<Box<dyn AgentPort>>;
}

/// Agents as selected by [`GameConfig::agent`].
pub struct ConfiguredAgents {
    config: GameConfig,
}

impl ConfiguredAgents {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl AgentSource for ConfiguredAgents {
    fn agent_for(&self, plan: &[SeatConfig], rng: &MatchRng) -> Result<Box<dyn AgentPort>> {
        match self.config.agent {
            AgentBackend::Rule => Ok(Box::new(RuleBasedAgent::new(rng.clone()))),
            AgentBackend::Chat => {
                let endpoint = self
                    .config
                    .chat
                    .clone()
                    .context("Chat backend selected but no chat endpoint configured")?;
                Ok(Box::new(ChatAgent::new(endpoint, plan)?))
            }
        }
    }
}

/// Factory that builds moderators from a `GameConfig`.
pub struct MatchFactory {
    pub config: GameConfig,
    pub prompts: Arc<PromptRepository>,
    agents: Arc<dyn AgentSource>,
}

impl MatchFactory {
    /// Loads the prompt repository named by the config.
    pub fn new(config: &GameConfig) -> Result<Self> {
        let prompts = PromptRepository::load(config.prompts_dir.as_deref())?;
        Ok(Self {
            config: config.clone(),
            prompts: Arc::new(prompts),
            agents: Arc::new(ConfiguredAgents::new(config)),
        })
    }

    /// Replace the agent source, e.g. with scripted agents.
    pub fn with_agents(mut self, agents: Arc<dyn AgentSource>) -> Self {
        self.agents = agents;
        self
    }

    /// Seed to use when the caller gives none.
    pub fn pick_seed(&self, seed: Option<u64>) -> u64 {
        seed.or(self.config.seed).unwrap_or_else(rand::random)
    }

    pub fn build(&self, seed: u64) -> Result<Moderator> {
        let rng = MatchRng::seeded(seed);
        let agent = self.agents.agent_for(&self.config.seating_plan, &rng)?;
        let moderator = Moderator::new(&self.config.seating_plan, agent, rng)
            .context("Failed to seat match")?
            .with_prompts(self.prompts.clone())
            .with_max_rounds(self.config.max_rounds);
        info!(
            seed,
            seats = self.config.seating_plan.len(),
            max_rounds = self.config.max_rounds,
            agent = ?self.config.agent,
            "Match seated"
        );
        Ok(moderator)
    }
}
