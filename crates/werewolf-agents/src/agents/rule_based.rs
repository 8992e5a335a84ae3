//! Deterministic rule-driven players for offline matches and demos.
//!
//! One [`RuleBasedAgent`] plays every seat. All random picks come from the
//! match RNG, so a seed fully determines the match.

use std::collections::BTreeMap;

use async_trait::async_trait;
use moderator::directive::{Keyword, SKIP_SENTINEL};
use moderator::{AgentError, AgentPort, MatchRng, Metadata, SeatId, Stage, StageCall};
use serde_json::Value;

/// What a seat remembers from its latest briefings.
#[derive(Debug, Clone, Default)]
struct SeatMemory {
    context: Metadata,
    digest: Metadata,
    notes: Vec<String>,
    vote_target: Option<SeatId>,
}

pub struct RuleBasedAgent {
    rng: MatchRng,
    seats: BTreeMap<SeatId, SeatMemory>,
}

fn string_list(meta: &Metadata, key: &str) -> Vec<String> {
    match meta.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn others(seats: &[SeatId], excluded: &[SeatId]) -> Vec<SeatId> {
    seats
        .iter()
        .copied()
        .filter(|s| !excluded.contains(s))
        .collect()
}

impl RuleBasedAgent {
    /// `rng` should be a handle on the match's own RNG.
    pub fn new(rng: MatchRng) -> Self {
        Self {
            rng,
            seats: BTreeMap::new(),
        }
    }

    /// Notes the seat last received in its private briefing.
    pub fn remembered_notes(&self, seat: SeatId) -> &[String] {
        self.seats.get(&seat).map(|m| m.notes.as_slice()).unwrap_or(&[])
    }

    fn observe(&mut self, call: &StageCall) {
        let memory = self.seats.entry(call.seat).or_default();
        match call.stage {
            Stage::Context => memory.context = call.metadata.clone(),
            Stage::ChronicleDigest => memory.digest = call.metadata.clone(),
            Stage::YourNotes => memory.notes = string_list(&call.metadata, "recent_notes"),
            _ => {}
        }
    }

    fn respond(&mut self, call: &StageCall) -> Option<String> {
        let me = call.seat;
        let meta = &call.metadata;
        match call.stage {
            Stage::LifeCheck => Some(if meta.get_bool("is_alive") == Some(false) {
                SKIP_SENTINEL.to_string()
            } else {
                "Ready.".to_string()
            }),
            Stage::Opening => {
                let persona = meta.get_str("persona").unwrap_or("quiet player");
                let dialect = meta.get_str("dialect_hint").unwrap_or("plain");
                Some(format!(
                    "Evening all, your {persona} here, talking with a {dialect} flavor."
                ))
            }
            Stage::NightWolves => Some(self.night_wolves(me, meta)),
            Stage::NightWitch => Some(self.night_witch(me, meta)),
            Stage::DayTalk => Some(self.day_talk(me, meta)),
            Stage::Vote => Some(self.vote(me, meta)),
            Stage::WriteNotes => {
                let target = self
                    .seats
                    .get(&me)
                    .and_then(|m| m.vote_target)
                    .unwrap_or(me);
                Some(
                    [
                        format!("- voted seat {target} to keep the pressure on"),
                        "- watch whether the wolves cover for each other".to_string(),
                        "- switch votes if the night stays quiet".to_string(),
                    ]
                    .join("\n"),
                )
            }
            Stage::HunterTrigger => {
                let alive = meta.seats("alive_targets");
                Some(match self.rng.choose(&others(&alive, &[me])) {
                    Some(target) => format!(
                        "{}\nTaking one more wolf with me.",
                        Keyword::Shoot.directive(target)
                    ),
                    None => "[HOLD]\nNo one worth the bullet.".to_string(),
                })
            }
            Stage::PostgameContext => Some("Good game, everyone. Learned a lot.".to_string()),
            Stage::PostgameRoundup => {
                Some("The tempo swung hard this match; our teamwork needs a review.".to_string())
            }
            Stage::PostgameRoast => {
                Some("Next time get to the point, it is more fun that way.".to_string())
            }
            Stage::Context | Stage::ChronicleDigest | Stage::YourNotes | Stage::WolfIntro => None,
        }
    }

    fn night_wolves(&mut self, me: SeatId, meta: &Metadata) -> String {
        let alive = meta.seats("alive_targets");
        let mut excluded = meta.seats("allies");
        excluded.push(me);
        let mut choices = others(&alive, &excluded);
        if choices.is_empty() {
            choices = others(&alive, &[me]);
        }

        let Some(target) = self.rng.choose(&choices) else {
            return "No one left to hunt tonight.".to_string();
        };
        let mut reply = format!(
            "Seat {target} led the votes too eagerly.\n{}",
            Keyword::Kill.directive(target)
        );
        if let Some(backup) = self.rng.choose(&others(&choices, &[target])) {
            reply.push('\n');
            reply.push_str(&Keyword::Backup.directive(backup));
        }
        reply
    }

    fn night_witch(&mut self, me: SeatId, meta: &Metadata) -> String {
        let victim = meta.seats("killed_list").first().copied();
        let heal_left = meta.get_u64("heal_left").unwrap_or(0);
        let poison_left = meta.get_u64("poison_left").unwrap_or(0);

        if let Some(victim) = victim.filter(|_| heal_left > 0) {
            return format!(
                "{}\nSaving a key voice.",
                Keyword::Heal.directive(victim)
            );
        }
        if poison_left > 0 {
            let alive = meta.seats("alive_targets");
            if let Some(target) = self.rng.choose(&others(&alive, &[me])) {
                return format!(
                    "{}\nTheir daytime play looked the most wolfish.",
                    Keyword::Poison.directive(target)
                );
            }
        }
        "[PASS]\nHolding still tonight.".to_string()
    }

    fn day_talk(&mut self, me: SeatId, meta: &Metadata) -> String {
        let rng = &self.rng;
        let memory = self.seats.entry(me).or_default();

        let alive = memory.context.seats("alive_map");
        let target = rng.choose(&others(&alive, &[me])).unwrap_or(me);
        let ally = rng.choose(&others(&alive, &[me, target])).unwrap_or(me);

        let summary = string_list(&memory.digest, "global_summary");
        let summary = if summary.is_empty() {
            "little to go on".to_string()
        } else {
            summary.iter().take(2).cloned().collect::<Vec<_>>().join("; ")
        };
        let quote = string_list(&memory.digest, "recent_transcript")
            .into_iter()
            .next()
            .unwrap_or_else(|| "nothing new since last night".to_string());

        let intro = if memory.context.get_bool("is_first_in_round") == Some(true) {
            format!("I'll open today: I vouch for seat {ally} and I'm pushing seat {target}.")
        } else {
            let turn = meta.get_u64("turn_index").unwrap_or(0);
            let total = meta.get_u64("total_speakers").unwrap_or(0);
            format!(
                "Speaker {turn} of {total}: I still vouch for seat {ally}, seat {target} worries me most."
            )
        };
        let reason = format!("The chronicle says {summary}, and \"{quote}\" makes me warier.");
        let wrap = format!(
            "Pressure on seat {target} for now, open to change. {}",
            Keyword::Vote.directive(target)
        );
        [intro, reason, wrap].join("\n")
    }

    fn vote(&mut self, me: SeatId, meta: &Metadata) -> String {
        let alive = meta.seats("alive_map");
        match self.rng.choose(&others(&alive, &[me])) {
            Some(target) => {
                self.seats.entry(me).or_default().vote_target = Some(target);
                Keyword::Vote.directive(target)
            }
            None => "Nobody left to vote for.".to_string(),
        }
    }
}

#[async_trait]
impl AgentPort for RuleBasedAgent {
    async fn decide(&mut self, call: &StageCall) -> Result<Option<String>, AgentError> {
        if !call.expect_reply {
            self.observe(call);
            return Ok(None);
        }
        Ok(self.respond(call))
    }
}
