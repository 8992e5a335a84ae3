use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use moderator::{Role, Roster, SeatConfig, DEFAULT_MAX_ROUNDS};
use serde::{Deserialize, Serialize};

/// Which agent implementation plays the seats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AgentBackend {
    /// Deterministic rule-based players driven by the match RNG.
    #[default]
    Rule,
    /// An OpenAI-compatible chat completions endpoint.
    Chat,
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEndpoint {
    /// Base URL, e.g. `http://localhost:8080/v1`.
    pub url: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Top-level game configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub seating_plan: Vec<SeatConfig>,
    /// Round cap. The match ends without a winner after this many rounds.
    pub max_rounds: u32,
    /// Fixed seed; a fresh one is drawn per match when unset.
    pub seed: Option<u64>,
    pub agent: AgentBackend,
    /// Directory of `*.md` prompt overrides (None = built-ins only).
    pub prompts_dir: Option<PathBuf>,
    /// Chat endpoint, required when `agent` is `Chat`.
    pub chat: Option<ChatEndpoint>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seating_plan: default_seating(),
            max_rounds: std::env::var("WEREWOLF_MAX_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ROUNDS),
            seed: std::env::var("WEREWOLF_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
            agent: AgentBackend::default(),
            prompts_dir: std::env::var("WEREWOLF_PROMPTS_DIR").ok().map(PathBuf::from),
            chat: Self::chat_from_env(),
        }
    }
}

/// The classic six-seat table: two wolves, a witch, a hunter, two villagers.
pub fn default_seating() -> Vec<SeatConfig> {
    vec![
        SeatConfig::new(1, Role::Wolf, "calm commentator", "plain"),
        SeatConfig::new(2, Role::Wolf, "sharp-tongued debater", "northern drawl"),
        SeatConfig::new(3, Role::Witch, "cheerful streamer", "southern lilt"),
        SeatConfig::new(4, Role::Hunter, "steady analyst", "coastal clip"),
        SeatConfig::new(5, Role::Villager, "gloomy poet", "soft river accent"),
        SeatConfig::new(6, Role::Villager, "seasoned captain", "island twang"),
    ]
}

/// On-disk shape of a config file. Every field is optional; missing ones
/// keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GameFile {
    max_rounds: Option<u32>,
    seed: Option<u64>,
    agent: Option<AgentBackend>,
    prompts_dir: Option<PathBuf>,
    chat: Option<ChatEndpoint>,
    #[serde(default, rename = "seat")]
    seats: Vec<SeatConfig>,
}

impl GameConfig {
    fn chat_from_env() -> Option<ChatEndpoint> {
        let url = std::env::var("WEREWOLF_CHAT_URL").ok()?;
        let model =
            std::env::var("WEREWOLF_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let api_key = std::env::var("WEREWOLF_CHAT_API_KEY").ok();
        Some(ChatEndpoint {
            url,
            model,
            api_key,
        })
    }

    /// Load a TOML config file on top of the defaults and validate it.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: GameFile = toml::from_str(text).context("Failed to parse TOML")?;
        let mut config = Self::default();
        if let Some(max_rounds) = file.max_rounds {
            config.max_rounds = max_rounds;
        }
        if file.seed.is_some() {
            config.seed = file.seed;
        }
        if let Some(agent) = file.agent {
            config.agent = agent;
        }
        if file.prompts_dir.is_some() {
            config.prompts_dir = file.prompts_dir;
        }
        if file.chat.is_some() {
            config.chat = file.chat;
        }
        if !file.seats.is_empty() {
            config.seating_plan = file.seats;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject seating plans the moderator cannot run, and a chat backend
    /// without an endpoint.
    pub fn validate(&self) -> Result<()> {
        Roster::from_seating(&self.seating_plan).context("Invalid seating plan")?;
        if self.agent == AgentBackend::Chat && self.chat.is_none() {
            bail!("agent = \"chat\" needs a [chat] endpoint or WEREWOLF_CHAT_URL");
        }
        Ok(())
    }
}

/// Check if a chat endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let config = GameConfig {
            seating_plan: default_seating(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            seed: None,
            agent: AgentBackend::Rule,
            prompts_dir: None,
            chat: None,
        };
        config.validate().unwrap();
        let roles: Vec<Role> = config.seating_plan.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Wolf,
                Role::Wolf,
                Role::Witch,
                Role::Hunter,
                Role::Villager,
                Role::Villager
            ]
        );
    }

    #[test]
    fn test_toml_overrides_rounds_seed_and_seats() {
        let config = GameConfig::from_toml_str(
            r#"
            max_rounds = 4
            seed = 77

            [[seat]]
            seat_id = 1
            role = "wolf"
            persona = "quiet baker"
            dialect = "plain"

            [[seat]]
            seat_id = 2
            role = "villager"
            persona = "loud smith"
            dialect = "northern"

            [[seat]]
            seat_id = 3
            role = "hunter"
            persona = "old ranger"
            dialect = "hill"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.seed, Some(77));
        assert_eq!(config.seating_plan.len(), 3);
        assert_eq!(config.seating_plan[2].role, Role::Hunter);
    }

    #[test]
    fn test_empty_file_keeps_default_table() {
        let config = GameConfig::from_toml_str("").unwrap();
        assert_eq!(config.seating_plan, default_seating());
    }

    #[test]
    fn test_rejects_bad_seating() {
        let duplicate = r#"
            [[seat]]
            seat_id = 1
            role = "wolf"
            persona = "a"
            dialect = "a"

            [[seat]]
            seat_id = 1
            role = "villager"
            persona = "b"
            dialect = "b"
        "#;
        assert!(GameConfig::from_toml_str(duplicate).is_err());

        let no_wolf = r#"
            [[seat]]
            seat_id = 1
            role = "villager"
            persona = "a"
            dialect = "a"
        "#;
        assert!(GameConfig::from_toml_str(no_wolf).is_err());

        assert!(GameConfig::from_toml_str("rounds = 3").is_err());
    }

    #[test]
    fn test_chat_backend_needs_endpoint() {
        let mut config = GameConfig::from_toml_str("").unwrap();
        config.agent = AgentBackend::Chat;
        config.chat = None;
        assert!(config.validate().is_err());

        config.chat = Some(ChatEndpoint {
            url: "http://localhost:8080/v1".into(),
            model: "local".into(),
            api_key: None,
        });
        config.validate().unwrap();
    }
}
