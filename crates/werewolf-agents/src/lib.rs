//! Werewolf Agents Library
//!
//! Everything around the `moderator` core that touches the outside world:
//! - Game configuration (defaults, environment, TOML files)
//! - The prompt repository that renders stage templates
//! - Rule-based and chat-endpoint agents
//! - A registry of running matches and its HTTP control surface
//! - Match telemetry

pub mod agents;
pub mod config;
pub mod prompts;
pub mod server;
pub mod sessions;
pub mod telemetry;

pub use agents::{AgentSource, ConfiguredAgents, MatchFactory};
pub use config::{AgentBackend, ChatEndpoint, GameConfig};
pub use prompts::{PromptRepository, PROMPT_VERSION};
pub use sessions::{MatchId, MatchRegistry, MatchSummary, RunReport, SessionError};
pub use telemetry::MatchMetrics;
