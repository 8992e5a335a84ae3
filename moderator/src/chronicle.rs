//! Append-only narrative record of a match.
//!
//! One [`RoundRecord`] per round, created on first touch, plus a bounded
//! global summary shared across the match. Resolvers write here after every
//! state-changing decision; agents only ever see digests of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::Metadata;
use crate::roster::SeatId;

/// First entry of every global summary.
pub const OPENING_SUMMARY: &str = "Night one is under way.";

pub const GLOBAL_SUMMARY_CAP: usize = 6;
pub const DAY_SUMMARY_CAP: usize = 10;
pub const NIGHT_SUMMARY_CAP: usize = 5;

/// Recent utterances included in an agent digest.
const DIGEST_TRANSCRIPT_LINES: usize = 6;

/// A deduplicated rolling list that keeps its most recent `cap` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedSummary {
    cap: usize,
    entries: Vec<String>,
}

impl BoundedSummary {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Vec::new(),
        }
    }

    /// Append `entry` unless an identical entry is already present. Returns
    /// whether the entry was added. The oldest entries drop off on overflow.
    pub fn push(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        if self.entries.len() > self.cap {
            let excess = self.entries.len() - self.cap;
            self.entries.drain(..excess);
        }
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> &[String] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Something that happened during a night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NightEvent {
    WolfVote { from: SeatId, target: SeatId },
    WolfBackup { from: SeatId, target: SeatId },
    Kill { target: SeatId },
    WitchHeal { target: SeatId },
    WitchPoison { target: SeatId },
    WitchIdle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightRecord {
    pub events: Vec<NightEvent>,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub seat: SeatId,
    /// 1-based position in the speaking order.
    pub turn: usize,
    pub text: String,
    pub one_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntry {
    pub from: SeatId,
    pub to: Option<SeatId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub order: Vec<SeatId>,
    pub utterances: Vec<Utterance>,
    pub votes: Vec<VoteEntry>,
    pub lynch: Option<SeatId>,
    pub summary: BoundedSummary,
}

impl Default for DayRecord {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            utterances: Vec::new(),
            votes: Vec::new(),
            lynch: None,
            summary: BoundedSummary::new(DAY_SUMMARY_CAP),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub night: NightRecord,
    pub day: DayRecord,
}

impl RoundRecord {
    fn new(round: u32) -> Self {
        Self {
            round,
            night: NightRecord::default(),
            day: DayRecord::default(),
        }
    }
}

/// Condensed view of the chronicle handed to agents before each decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub global_summary: String,
    pub round_summaries: String,
    pub recent_transcript: String,
}

impl Digest {
    pub fn to_metadata(&self) -> Metadata {
        Metadata::new()
            .with("global_summary", &self.global_summary)
            .with("round_summaries", &self.round_summaries)
            .with("recent_transcript", &self.recent_transcript)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chronicle {
    rounds: BTreeMap<u32, RoundRecord>,
    global: BoundedSummary,
}

impl Default for Chronicle {
    fn default() -> Self {
        Self::new()
    }
}

impl Chronicle {
    pub fn new() -> Self {
        let mut global = BoundedSummary::new(GLOBAL_SUMMARY_CAP);
        global.push(OPENING_SUMMARY);
        Self {
            rounds: BTreeMap::new(),
            global,
        }
    }

    pub fn ensure_round(&mut self, round: u32) -> &mut RoundRecord {
        self.rounds
            .entry(round)
            .or_insert_with(|| RoundRecord::new(round))
    }

    pub fn round(&self, round: u32) -> Option<&RoundRecord> {
        self.rounds.get(&round)
    }

    /// Round records in ascending round order.
    pub fn rounds(&self) -> impl Iterator<Item = &RoundRecord> {
        self.rounds.values()
    }

    pub fn global_summary(&self) -> &BoundedSummary {
        &self.global
    }

    pub fn log_night_event(&mut self, round: u32, event: NightEvent) {
        self.ensure_round(round).night.events.push(event);
    }

    /// Replace the night summary, keeping at most five lines.
    pub fn set_night_summary(&mut self, round: u32, lines: Vec<String>) {
        let mut lines = lines;
        lines.truncate(NIGHT_SUMMARY_CAP);
        self.ensure_round(round).night.summary = lines;
    }

    pub fn set_day_order(&mut self, round: u32, order: Vec<SeatId>) {
        self.ensure_round(round).day.order = order;
    }

    pub fn add_utterance(&mut self, round: u32, utterance: Utterance) {
        self.ensure_round(round).day.utterances.push(utterance);
    }

    pub fn add_vote(&mut self, round: u32, from: SeatId, to: Option<SeatId>) {
        self.ensure_round(round)
            .day
            .votes
            .push(VoteEntry { from, to });
    }

    pub fn set_lynch(&mut self, round: u32, seat: Option<SeatId>) {
        self.ensure_round(round).day.lynch = seat;
    }

    pub fn append_day_summary(&mut self, round: u32, entry: impl Into<String>) -> bool {
        self.ensure_round(round).day.summary.push(entry)
    }

    pub fn refresh_global_summary(&mut self, entry: impl Into<String>) -> bool {
        self.global.push(entry)
    }

    /// Last three global entries, last three day-summary entries of the two
    /// most recent rounds, and the six most recent one-liners (newest first).
    pub fn digest(&self) -> Digest {
        let global_summary = join_or(self.global.tail(3), "no summary yet");

        let round_summaries: Vec<String> = self
            .rounds
            .values()
            .rev()
            .take(2)
            .rev()
            .map(|record| {
                format!(
                    "R{}: {}",
                    record.round,
                    join_or(record.day.summary.tail(3), "no summary yet")
                )
            })
            .collect();

        let recent_transcript: Vec<String> = self
            .rounds
            .values()
            .rev()
            .flat_map(|record| record.day.utterances.iter().rev())
            .take(DIGEST_TRANSCRIPT_LINES)
            .map(|u| format!("seat {}: {}", u.seat, u.one_line))
            .collect();

        Digest {
            global_summary,
            round_summaries: join_or(&round_summaries, "no round summaries yet"),
            recent_transcript: join_or(&recent_transcript, "no speeches yet"),
        }
    }

    /// Full-match recap: the global summary followed by every round's night
    /// and day summaries.
    pub fn postgame_digest(&self) -> String {
        let mut lines = vec!["Key moments of the match:".to_string()];
        lines.extend(self.global.entries().iter().cloned());
        for record in self.rounds.values() {
            lines.push(format!(
                "Night {}: {}",
                record.round,
                record.night.summary.join("; ")
            ));
            lines.push(format!(
                "Day {}: {}",
                record.round,
                record.day.summary.entries().join("; ")
            ));
        }
        lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join("; ")
    }
}
