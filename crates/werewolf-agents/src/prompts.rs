//! Stage prompt templates and the repository that renders them.
//!
//! Every stage has a built-in English template. A prompts directory may
//! override any of them with a `<template_name>.md` file, e.g.
//! `stage_vote.md`.
//!
//! Templates use `{name}` placeholders filled from the stage metadata.
//! Strings are inserted verbatim, anything else as compact JSON. `{{` and
//! `}}` produce literal braces.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever a built-in template
//! changes, so transcripts can be traced back to the wording that produced
//! them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use moderator::{Metadata, PromptError, PromptRenderer, SeatConfig, Stage};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Prompt version. Bump on any built-in template change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// System preamble for chat-backed seats. Placeholders come from the seat
/// configuration, not from stage metadata.
pub const SEAT_PREAMBLE: &str = "\
You are seat {seat} at a game of Werewolf. Your secret role is {role}.
You play the persona of a {persona} and speak with a {dialect} flavor.

## Rules
- Two factions: the wolves, who kill one seat each night, and the villagers \
(witch, hunter and plain villagers), who lynch one seat each day.
- The villagers win once every wolf is dead. The wolves win once they are at \
least as many as everyone else.
- Never reveal your role unless it helps your faction.

## Answer format
When asked to act, write your reasoning in plain text and put the action on \
its own line as a bracketed keyword followed by a seat, for example \
`[VOTE]seat3`. Reply with exactly `[SKIP]` to sit out a night turn.";

pub const STAGE_LIFE_CHECK: &str = "\
Moderator check-in. Alive: {is_alive}.
If you are dead or want to sit this turn out, reply with exactly [SKIP]. \
Otherwise reply with a short acknowledgement.";

pub const STAGE_CONTEXT: &str = "\
Round {round}, phase {stage}. Time on the clock: {time_left}.
Speaking order: {speaker_order}. Your turn index: {turn_index} \
(first in round: {is_first_in_round}).
Alive map: {alive_map}";

pub const STAGE_CHRONICLE_DIGEST: &str = "\
Chronicle so far.
Global: {global_summary}
Recent rounds: {round_summaries}
Recent speeches: {recent_transcript}";

pub const STAGE_YOUR_NOTES: &str = "\
Private briefing. Persona: {persona}; dialect: {dialect_hint}.
Your role and capabilities: {private_role}
Your recent notes: {recent_notes}";

pub const STAGE_WOLF_INTRO: &str = "\
You are a wolf. Your pack: {allies_text}. \
Coordinate at night, protect each other by day.";

pub const STAGE_OPENING: &str = "\
Introduce yourself to the table in one or two sentences, in character as a \
{persona} with a {dialect_hint} flavor. Do not reveal your role.";

pub const STAGE_NIGHT_WOLVES: &str = "\
Night falls. Choose tonight's victim among {alive_targets}. Your allies: {allies}.
Give one line of reasoning, then write [KILL]seatN. You may add a second \
choice as [BACKUP]seatN.";

pub const STAGE_NIGHT_WITCH: &str = "\
Night, witch turn. The wolves attacked: {killed_list}.
Potions left: heal {heal_left}, poison {poison_left}. Alive seats: {alive_targets}.
Write [HEAL]seatN to save the victim, [POISON]seatN to poison someone, \
or [PASS] to do nothing. One potion per night.";

pub const STAGE_DAY_TALK: &str = "\
Your turn to speak ({turn_index} of {total_speakers}).
Say who you trust and who you suspect, and why. Keep it under three lines. \
You may end with the seat you lean towards as [VOTE]seatN.";

pub const STAGE_WRITE_NOTES: &str = "\
Round {round} is winding down. Write up to five private notes for yourself, \
one per line, each starting with \"- \".";

pub const STAGE_VOTE: &str = "\
Time to vote. Alive map: {alive_map}.
Write [VOTE]seatN for the seat you want lynched. You cannot abstain.";

pub const STAGE_HUNTER_TRIGGER: &str = "\
You have died ({cause}). As the hunter you may take one seat with you.
Alive seats: {alive_targets}. Write [SHOOT]seatN, or anything else to hold fire.";

pub const STAGE_POSTGAME_CONTEXT: &str = "\
The match is over. Result: {result}.
{final_transcript_digest}
Your last notes: {your_notes_tail}";

pub const STAGE_POSTGAME_ROUNDUP: &str = "\
In two sentences, sum up how the match went for you.";

pub const STAGE_POSTGAME_ROAST: &str = "\
One friendly roast line for the table, in character.";

/// Built-in template for a stage.
pub fn builtin_template(stage: Stage) -> &'static str {
    match stage {
        Stage::LifeCheck => STAGE_LIFE_CHECK,
        Stage::Context => STAGE_CONTEXT,
        Stage::ChronicleDigest => STAGE_CHRONICLE_DIGEST,
        Stage::YourNotes => STAGE_YOUR_NOTES,
        Stage::WolfIntro => STAGE_WOLF_INTRO,
        Stage::Opening => STAGE_OPENING,
        Stage::NightWolves => STAGE_NIGHT_WOLVES,
        Stage::NightWitch => STAGE_NIGHT_WITCH,
        Stage::DayTalk => STAGE_DAY_TALK,
        Stage::WriteNotes => STAGE_WRITE_NOTES,
        Stage::Vote => STAGE_VOTE,
        Stage::HunterTrigger => STAGE_HUNTER_TRIGGER,
        Stage::PostgameContext => STAGE_POSTGAME_CONTEXT,
        Stage::PostgameRoundup => STAGE_POSTGAME_ROUNDUP,
        Stage::PostgameRoast => STAGE_POSTGAME_ROAST,
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

fn is_placeholder(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{name}` placeholders in `template`.
///
/// A brace that does not open a well-formed placeholder is kept as is.
///
/// # Errors
///
/// [`PromptError::MissingPlaceholder`] naming the first placeholder with no
/// metadata value.
pub fn render_template(
    name: &str,
    template: &str,
    metadata: &Metadata,
) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let key = &tail[1..end];
                if is_placeholder(key) {
                    let value =
                        metadata
                            .get(key)
                            .ok_or_else(|| PromptError::MissingPlaceholder {
                                template: name.to_string(),
                                key: key.to_string(),
                            })?;
                    out.push_str(&display_value(value));
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// System preamble for one seat.
pub fn seat_preamble(seat: &SeatConfig) -> Result<String, PromptError> {
    let meta = Metadata::new()
        .with("seat", seat.seat_id)
        .with("role", seat.role.as_str())
        .with("persona", &seat.persona)
        .with("dialect", &seat.dialect);
    render_template("seat_preamble", SEAT_PREAMBLE, &meta)
}

/// A metadata bag carrying every key any built-in template references.
pub fn sample_metadata() -> Metadata {
    Metadata::new()
        .with("is_alive", true)
        .with("round", 2)
        .with("stage", "DAY_TALK")
        .with("speaker_order", [1, 2, 4, 5])
        .with("turn_index", 1)
        .with("total_speakers", 4)
        .with("is_first_in_round", true)
        .with("alive_map", json!({"1": true, "2": true, "3": false, "4": true, "5": true}))
        .with("time_left", "moderate")
        .with("global_summary", ["Night 1 resolved: deaths seat 3"])
        .with("round_summaries", ["R1: Seat 6 was lynched"])
        .with("recent_transcript", ["seat 1: I trust seat 2"])
        .with("persona", "steady analyst")
        .with("dialect_hint", "coastal clip")
        .with("private_role", json!({"role": "witch", "potions": {"heal_left": 1, "poison_left": 0}}))
        .with("recent_notes", ["watch seat 2; seat 4 flip-flopped"])
        .with("allies", [2])
        .with("allies_text", "seat 2")
        .with("alive_targets", [1, 2, 4, 5])
        .with("killed_list", [4])
        .with("heal_left", 1)
        .with("poison_left", 0)
        .with("cause", "night")
        .with("result", "wolves_win")
        .with("final_transcript_digest", "Key moments of the match:")
        .with("your_notes_tail", ["keep an eye on seat 2"])
}

// ─── Repository ─────────────────────────────────────────────────────────────

/// Named templates: the built-ins, optionally overridden from a directory.
#[derive(Debug, Clone)]
pub struct PromptRepository {
    templates: BTreeMap<String, String>,
    overridden: BTreeSet<String>,
}

impl Default for PromptRepository {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptRepository {
    /// Built-in templates only.
    pub fn builtin() -> Self {
        let templates = Stage::ALL
            .into_iter()
            .map(|stage| (stage.template_name().to_string(), builtin_template(stage).to_string()))
            .collect();
        Self {
            templates,
            overridden: BTreeSet::new(),
        }
    }

    /// Built-ins overridden by every `*.md` file in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Prompts directory not found: {}", dir.display());
        }

        let mut repo = Self::builtin();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list prompts directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt {}", path.display()))?;
            if Stage::from_template_name(name).is_none() {
                warn!(name, "Prompt file matches no stage; it will never be rendered");
            }
            debug!(name, path = %path.display(), "Loaded prompt override");
            repo.overridden.insert(name.to_string());
            repo.templates.insert(name.to_string(), text);
        }

        info!(
            dir = %dir.display(),
            overrides = repo.overridden.len(),
            version = PROMPT_VERSION,
            "Prompt repository loaded"
        );
        Ok(repo)
    }

    /// Load from `dir` if given, else the built-ins.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Ok(Self::builtin()),
        }
    }

    pub fn get(&self, name: &str) -> Result<&str, PromptError> {
        let key = name.strip_suffix(".md").unwrap_or(name);
        self.templates
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    pub fn render_named(&self, name: &str, metadata: &Metadata) -> Result<String, PromptError> {
        render_template(name, self.get(name)?, metadata)
    }

    /// Template names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        self.overridden.contains(name)
    }

    /// Render every template against `sample`; returns the failures.
    pub fn check(&self, sample: &Metadata) -> Vec<(String, PromptError)> {
        self.templates
            .iter()
            .filter_map(|(name, template)| {
                render_template(name, template, sample)
                    .err()
                    .map(|e| (name.clone(), e))
            })
            .collect()
    }
}

impl PromptRenderer for PromptRepository {
    fn render(&self, stage: Stage, metadata: &Metadata) -> Result<String, PromptError> {
        self.render_named(stage.template_name(), metadata)
    }
}
