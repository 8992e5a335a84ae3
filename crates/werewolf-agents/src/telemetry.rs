//! Structured telemetry for finished matches.
//!
//! Two output sinks:
//! - a metrics file (`--metrics-out`): one pretty-printed snapshot, overwritten per match
//! - a JSONL log: append-only, one line per finished match
//!
//! Telemetry never fails a match: every I/O problem is logged and dropped.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moderator::{FinishReason, GameResult, Moderator};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default JSONL log written by `werewolf serve`.
pub const DEFAULT_TELEMETRY_LOG: &str = ".werewolf-telemetry.jsonl";

/// Summary metrics of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    pub match_id: String,
    pub seed: u64,
    pub rounds_played: u32,
    pub result: GameResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Seats dead at the end, by any cause.
    pub deaths: usize,
    pub lynches: usize,
    pub hunter_shots: usize,
    /// Agent interactions, briefings included.
    pub stage_calls: usize,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl MatchMetrics {
    pub fn from_moderator(
        match_id: &str,
        seed: u64,
        moderator: &Moderator,
        elapsed: Duration,
    ) -> Self {
        let stats = moderator.stats();
        Self {
            match_id: match_id.to_string(),
            seed,
            rounds_played: stats.rounds_played,
            result: moderator.result(),
            finish_reason: moderator.finish_reason(),
            deaths: stats.deaths,
            lynches: stats.lynches,
            hunter_shots: stats.hunter_shots,
            stage_calls: stats.stage_calls,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        }
    }
}

/// Write metrics as pretty JSON to `path`, replacing any previous file.
pub fn write_match_metrics(metrics: &MatchMetrics, path: &Path) {
    match serde_json::to_string_pretty(metrics) {
        Ok(json) => match std::fs::write(path, json) {
            Ok(()) => info!(path = %path.display(), "Wrote match metrics"),
            Err(e) => warn!("Failed to write match metrics: {e}"),
        },
        Err(e) => warn!("Failed to serialize match metrics: {e}"),
    }
}

/// Append metrics to the JSONL log at `path`.
///
/// Each line is a complete JSON object for easy streaming analysis.
pub fn append_telemetry(metrics: &MatchMetrics, path: &Path) {
    match serde_json::to_string(metrics) {
        Ok(json) => {
            use std::io::Write;
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        warn!("Failed to append telemetry: {e}");
                    } else {
                        info!(path = %path.display(), "Appended match telemetry");
                    }
                }
                Err(e) => warn!("Failed to open telemetry file: {e}"),
            }
        }
        Err(e) => warn!("Failed to serialize telemetry: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moderator::Faction;

    fn sample(id: &str) -> MatchMetrics {
        MatchMetrics {
            match_id: id.into(),
            seed: 42,
            rounds_played: 3,
            result: GameResult::VillagersWin,
            finish_reason: Some(FinishReason::Victory(Faction::Villagers)),
            deaths: 4,
            lynches: 2,
            hunter_shots: 1,
            stage_calls: 180,
            elapsed_ms: 12,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_write_metrics_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        write_match_metrics(&sample("a"), &path);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let back: MatchMetrics = serde_json::from_str(&text).unwrap();
        assert_eq!(back.match_id, "a");
        assert_eq!(back.result, GameResult::VillagersWin);
    }

    #[test]
    fn test_append_telemetry_one_line_per_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_telemetry(&sample("a"), &path);
        append_telemetry(&sample("b"), &path);

        let text = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<MatchMetrics>(l).unwrap().match_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("metrics.json");
        write_match_metrics(&sample("a"), &path);
        append_telemetry(&sample("a"), &path);
        assert!(!path.exists());
    }
}
