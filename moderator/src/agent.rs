//! The seams between the moderator and its collaborators.
//!
//! The moderator never decides anything on a seat's behalf. For every stage
//! it builds a [`StageCall`], optionally renders a prompt through a
//! [`PromptRenderer`], and asks an [`AgentPort`] for a reply.
//!
//! ## Stage flow for one decision
//!
//! ```text
//! stage_life_check        - probe; "[SKIP]" ends the seat's turn at night
//! stage_context           - briefing (no reply)
//! stage_chronicle_digest  - briefing (no reply)
//! stage_your_notes        - briefing (no reply)
//! stage_<decision>        - reply parsed for directives
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, PromptError};
use crate::roster::SeatId;

// ── Stages ───────────────────────────────────────────────────────────────────

/// Closed set of stages the moderator sends to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LifeCheck,
    Context,
    ChronicleDigest,
    YourNotes,
    WolfIntro,
    Opening,
    NightWolves,
    NightWitch,
    DayTalk,
    WriteNotes,
    Vote,
    HunterTrigger,
    PostgameContext,
    PostgameRoundup,
    PostgameRoast,
}

impl Stage {
    pub const ALL: [Stage; 15] = [
        Stage::LifeCheck,
        Stage::Context,
        Stage::ChronicleDigest,
        Stage::YourNotes,
        Stage::WolfIntro,
        Stage::Opening,
        Stage::NightWolves,
        Stage::NightWitch,
        Stage::DayTalk,
        Stage::WriteNotes,
        Stage::Vote,
        Stage::HunterTrigger,
        Stage::PostgameContext,
        Stage::PostgameRoundup,
        Stage::PostgameRoast,
    ];

    /// Stable template name, used as the prompt file stem.
    pub fn template_name(self) -> &'static str {
        match self {
            Self::LifeCheck => "stage_life_check",
            Self::Context => "stage_context",
            Self::ChronicleDigest => "stage_chronicle_digest",
            Self::YourNotes => "stage_your_notes",
            Self::WolfIntro => "stage_wolf_intro",
            Self::Opening => "stage_opening",
            Self::NightWolves => "stage_night_wolves",
            Self::NightWitch => "stage_night_witch",
            Self::DayTalk => "stage_day_talk",
            Self::WriteNotes => "stage_write_notes",
            Self::Vote => "stage_vote",
            Self::HunterTrigger => "stage_hunter_trigger",
            Self::PostgameContext => "stage_postgame_context",
            Self::PostgameRoundup => "stage_postgame_roundup",
            Self::PostgameRoast => "stage_postgame_roast",
        }
    }

    pub fn from_template_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.template_name() == name)
    }

    /// Briefing stages deliver information only; any reply is discarded.
    pub fn expects_reply(self) -> bool {
        !matches!(
            self,
            Self::Context | Self::ChronicleDigest | Self::YourNotes | Self::WolfIntro
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

// ── Metadata ─────────────────────────────────────────────────────────────────

/// Named-field bag describing game state for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Values that cannot be represented as JSON are
    /// stored as `null`.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(key.into(), value);
    }

    /// Merge every field of `other` into `self`, overwriting duplicates.
    pub fn extend(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Seat ids from an array field, or the `true` keys of an alive-map
    /// object field.
    pub fn seats(&self, key: &str) -> Vec<SeatId> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|s| SeatId::try_from(s).ok())
                .collect(),
            Some(Value::Object(map)) => {
                // Object keys are strings; restore numeric seat order.
                let mut seats: Vec<SeatId> = map
                    .iter()
                    .filter(|(_, alive)| alive.as_bool() == Some(true))
                    .filter_map(|(seat, _)| seat.parse().ok())
                    .collect();
                seats.sort_unstable();
                seats
            }
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Calls and replies ────────────────────────────────────────────────────────

/// Everything an agent gets to see for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCall {
    pub seat: SeatId,
    pub round: u32,
    pub stage: Stage,
    pub metadata: Metadata,
    /// Rendered prompt text, when a renderer is attached to the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub expect_reply: bool,
}

/// Transcript entry for one interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLog {
    pub round: u32,
    pub seat: SeatId,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// Decision-making policy bound to the seats of one match.
///
/// One port serves every seat; implementations keep per-seat state keyed by
/// [`StageCall::seat`]. `Ok(None)` means "no action". Stages an
/// implementation does not handle must also yield `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentPort: Send {
    async fn decide(&mut self, call: &StageCall) -> Result<Option<String>, AgentError>;
}

/// Maps a stage plus metadata to prompt text.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, stage: Stage, metadata: &Metadata) -> Result<String, PromptError>;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn template_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_template_name(stage.template_name()), Some(stage));
        }
        assert_eq!(Stage::from_template_name("stage_unknown"), None);
    }

    #[test]
    fn briefings_expect_no_reply() {
        assert!(!Stage::Context.expects_reply());
        assert!(!Stage::WolfIntro.expects_reply());
        assert!(Stage::LifeCheck.expects_reply());
        assert!(Stage::PostgameRoast.expects_reply());
    }

    #[test]
    fn metadata_seats_reads_lists_and_alive_maps() {
        let alive: BTreeMap<SeatId, bool> = [(1, true), (2, false), (3, true)].into();
        let meta = Metadata::new()
            .with("alive_targets", vec![4u32, 5])
            .with("alive_map", &alive)
            .with("round", 2);

        assert_eq!(meta.seats("alive_targets"), vec![4, 5]);
        assert_eq!(meta.seats("alive_map"), vec![1, 3]);
        assert!(meta.seats("round").is_empty());
        assert_eq!(meta.get_u64("round"), Some(2));
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn extend_overwrites() {
        let mut base = Metadata::new().with("a", 1).with("b", "x");
        base.extend(Metadata::new().with("b", "y"));
        assert_eq!(base.get_str("b"), Some("y"));
        assert_eq!(base.get_u64("a"), Some(1));
    }
}
