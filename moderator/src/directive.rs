//! Tolerant parsing of agent replies into structured actions.
//!
//! Agents answer in free text. Actions are embedded as a bracketed keyword
//! followed by a seat reference, e.g. `[KILL]seat3` or `【VOTE】 seat 5`.
//! Several directives may share one reply. Nothing here can fail: text that
//! does not match simply yields no target.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::roster::SeatId;

/// Reply sentinel that short-circuits the calling phase.
pub const SKIP_SENTINEL: &str = "[SKIP]";

/// Placeholder used when a speech has no usable first line.
pub const EMPTY_SUMMARY: &str = "(no summary)";

/// Longest one-line speech summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 60;

/// Most bullets a seat may record per note.
pub const MAX_NOTE_BULLETS: usize = 5;

/// Keyword vocabulary understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyword {
    Kill,
    Backup,
    Heal,
    Poison,
    Vote,
    Shoot,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kill => "KILL",
            Self::Backup => "BACKUP",
            Self::Heal => "HEAL",
            Self::Poison => "POISON",
            Self::Vote => "VOTE",
            Self::Shoot => "SHOOT",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "KILL" => Some(Self::Kill),
            "BACKUP" => Some(Self::Backup),
            "HEAL" => Some(Self::Heal),
            "POISON" => Some(Self::Poison),
            "VOTE" => Some(Self::Vote),
            "SHOOT" => Some(Self::Shoot),
            _ => None,
        }
    }

    /// Render the directive the way agents are asked to write it.
    pub fn directive(self, seat: SeatId) -> String {
        format!("[{}]seat{}", self.as_str(), seat)
    }
}

/// A structured action extracted from a reply. Resolvers operate on these
/// and never look at the raw text again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "seat", rename_all = "snake_case")]
pub enum Directive {
    Kill(SeatId),
    Backup(SeatId),
    Heal(SeatId),
    Poison(SeatId),
    Vote(SeatId),
    Shoot(SeatId),
    Pass,
}

impl Directive {
    fn from_parts(keyword: Keyword, seat: SeatId) -> Self {
        match keyword {
            Keyword::Kill => Self::Kill(seat),
            Keyword::Backup => Self::Backup(seat),
            Keyword::Heal => Self::Heal(seat),
            Keyword::Poison => Self::Poison(seat),
            Keyword::Vote => Self::Vote(seat),
            Keyword::Shoot => Self::Shoot(seat),
        }
    }

    pub fn keyword(self) -> Option<Keyword> {
        match self {
            Self::Kill(_) => Some(Keyword::Kill),
            Self::Backup(_) => Some(Keyword::Backup),
            Self::Heal(_) => Some(Keyword::Heal),
            Self::Poison(_) => Some(Keyword::Poison),
            Self::Vote(_) => Some(Keyword::Vote),
            Self::Shoot(_) => Some(Keyword::Shoot),
            Self::Pass => None,
        }
    }

    pub fn target(self) -> Option<SeatId> {
        match self {
            Self::Kill(s)
            | Self::Backup(s)
            | Self::Heal(s)
            | Self::Poison(s)
            | Self::Vote(s)
            | Self::Shoot(s) => Some(s),
            Self::Pass => None,
        }
    }
}

/// Both ASCII and full-width brackets are accepted. The seat number runs to
/// the end of the digits; out-of-range numbers fail to parse.
static DIRECTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\[【](?P<action>[^\]】\n]{1,16})[\]】]\s*(?i:seat)\s*(?P<seat>\d+)")
        .unwrap_or_else(|e| unreachable!("directive pattern is a valid regex: {e}"))
});

/// Every recognised directive in reply order. Unknown keywords are ignored.
pub fn parse_all(text: &str) -> Vec<Directive> {
    DIRECTIVE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let keyword = Keyword::parse(caps.name("action")?.as_str())?;
            let seat = caps.name("seat")?.as_str().parse::<SeatId>().ok()?;
            Some(Directive::from_parts(keyword, seat))
        })
        .collect()
}

/// First target named for `keyword`, if any.
pub fn parse_target(text: &str, keyword: Keyword) -> Option<SeatId> {
    parse_all(text)
        .into_iter()
        .find(|d| d.keyword() == Some(keyword))
        .and_then(Directive::target)
}

/// Reduce a reply to the first directive matching one of `accepted`, in the
/// order given, or [`Directive::Pass`].
pub fn first_of(text: &str, accepted: &[Keyword]) -> Directive {
    let parsed = parse_all(text);
    accepted
        .iter()
        .find_map(|kw| parsed.iter().copied().find(|d| d.keyword() == Some(*kw)))
        .unwrap_or(Directive::Pass)
}

/// Whether a reply is the skip sentinel.
pub fn is_skip(reply: Option<&str>) -> bool {
    reply.is_some_and(|r| r.trim() == SKIP_SENTINEL)
}

/// Bullet lines (`- `, `* ` or `• `) from a write-notes reply, at most five.
pub fn extract_notes(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            ["- ", "* ", "• "]
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
        })
        .map(str::trim)
        .filter(|bullet| !bullet.is_empty())
        .map(String::from)
        .take(MAX_NOTE_BULLETS)
        .collect()
}

/// First non-empty line of a speech, truncated to sixty characters.
pub fn one_line_summary(text: &str) -> String {
    let first = text.trim().lines().next().map(str::trim).unwrap_or("");
    if first.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }
    first.chars().take(SUMMARY_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ascii_and_fullwidth_brackets() {
        assert_eq!(parse_target("[KILL]seat3", Keyword::Kill), Some(3));
        assert_eq!(parse_target("【VOTE】 Seat 12", Keyword::Vote), Some(12));
        assert_eq!(parse_target("[heal] seat4", Keyword::Heal), Some(4));
    }

    #[test]
    fn kill_and_backup_are_independent() {
        let reply = "Going after the loud one.\n[KILL]seat5\n[BACKUP]seat6";
        assert_eq!(parse_target(reply, Keyword::Kill), Some(5));
        assert_eq!(parse_target(reply, Keyword::Backup), Some(6));

        let only_backup = "[BACKUP]seat6";
        assert_eq!(parse_target(only_backup, Keyword::Kill), None);
        assert_eq!(parse_target(only_backup, Keyword::Backup), Some(6));
    }

    #[test]
    fn seat_number_is_never_truncated() {
        assert_eq!(parse_target("[VOTE]seat1234567", Keyword::Vote), Some(1234567));
        assert_eq!(parse_target("[VOTE]seat99999999999", Keyword::Vote), None);
        assert_eq!(parse_all("[KILL]seat12345678901 [BACKUP]seat2"), vec![Directive::Backup(2)]);
    }

    #[test]
    fn first_match_wins_for_repeated_keyword() {
        assert_eq!(
            parse_target("[VOTE]seat2 actually [VOTE]seat4", Keyword::Vote),
            Some(2)
        );
    }

    #[test]
    fn malformed_text_yields_nothing() {
        for text in [
            "",
            "no directives here",
            "[KILL]",
            "[KILL]seat",
            "[KILL seat3",
            "KILL seat3",
            "[DANCE]seat3",
            "[KILL]seat99999999999",
            "[KILL]seat4294967296",
            "【】seat1",
        ] {
            assert_eq!(parse_target(text, Keyword::Kill), None, "text: {text:?}");
        }
        assert!(parse_all("[DANCE]seat3 [SING]seat2").is_empty());
    }

    #[test]
    fn first_of_respects_precedence() {
        let reply = "[POISON]seat2\n[HEAL]seat3";
        assert_eq!(
            first_of(reply, &[Keyword::Heal, Keyword::Poison]),
            Directive::Heal(3)
        );
        assert_eq!(first_of("[PASS]", &[Keyword::Heal]), Directive::Pass);
    }

    #[test]
    fn skip_sentinel_is_trimmed() {
        assert!(is_skip(Some("  [SKIP]\n")));
        assert!(!is_skip(Some("[SKIP] but also talking")));
        assert!(!is_skip(None));
    }

    #[test]
    fn notes_keep_at_most_five_bullets() {
        let text = "thinking...\n- one\n* two\n• three\n-not a bullet\n- four\n- five\n- six\n- ";
        assert_eq!(
            extract_notes(text),
            vec!["one", "two", "three", "four", "five"]
        );
        assert!(extract_notes("plain prose").is_empty());
    }

    #[test]
    fn summary_truncates_by_characters() {
        let long = "狼".repeat(80);
        let summary = one_line_summary(&format!("{long}\nsecond line"));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(one_line_summary("   \n  "), EMPTY_SUMMARY);
        assert_eq!(one_line_summary("  hello\nworld"), "hello");
    }

    #[test]
    fn keyword_renders_parseable_directive() {
        let text = Keyword::Shoot.directive(4);
        assert_eq!(text, "[SHOOT]seat4");
        assert_eq!(parse_all(&text), vec![Directive::Shoot(4)]);
    }
}
