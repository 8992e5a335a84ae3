//! Round phases and the legal transitions between them.
//!
//! Every match starts at `Night` in round 1 and ends at `Postgame`:
//! 1. Every phase change is validated against the transition table.
//! 2. Every accepted change is recorded, so a finished match can be audited
//!    step by step.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};

/// The phases of a round, plus the terminal postgame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Wolves choose a victim, then the witch acts.
    Night,
    /// Night deaths are announced and reactive abilities fire.
    Daybreak,
    /// Alive seats speak in seat order.
    DayTalk,
    /// Alive seats vote; the plurality is lynched.
    Vote,
    /// Match over; terminal.
    Postgame,
}

impl Phase {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Postgame)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Night => write!(f, "NIGHT"),
            Self::Daybreak => write!(f, "DAYBREAK"),
            Self::DayTalk => write!(f, "DAY_TALK"),
            Self::Vote => write!(f, "VOTE"),
            Self::Postgame => write!(f, "POSTGAME"),
        }
    }
}

/// Legal phase transitions:
/// ```text
/// Night → Daybreak
/// Daybreak → DayTalk
/// DayTalk → Vote
/// Vote → Night            (round number increments)
/// any non-terminal → Postgame
/// ```
fn is_legal_transition(from: Phase, to: Phase) -> bool {
    use Phase::*;

    if to == Postgame && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Night, Daybreak) | (Daybreak, DayTalk) | (DayTalk, Vote) | (Vote, Night)
    )
}

/// A single recorded phase transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Phase,
    pub to: Phase,
    /// Round number at the time of the transition.
    pub round: u32,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Current phase plus the log of how the match got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMachine {
    current: Phase,
    transitions: Vec<TransitionRecord>,
}

impl PhaseMachine {
    /// Start at `Night`.
    pub fn new() -> Self {
        Self {
            current: Phase::Night,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Move to `to`, recording the change.
    ///
    /// # Errors
    ///
    /// [`MatchError::IllegalTransition`] if the edge is not in the table.
    pub fn advance(&mut self, to: Phase, round: u32, reason: Option<&str>) -> MatchResult<()> {
        if !is_legal_transition(self.current, to) {
            return Err(MatchError::IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, round, "Phase transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            round,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// `NIGHT → DAYBREAK → ...` rendering of the visited phases.
    pub fn summary(&self) -> String {
        let mut states = vec![Phase::Night.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        states.join(" → ")
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let pm = PhaseMachine::new();
        assert_eq!(pm.current(), Phase::Night);
        assert!(!pm.is_terminal());
        assert!(pm.transitions().is_empty());
    }

    #[test]
    fn test_full_round_then_postgame() {
        let mut pm = PhaseMachine::new();
        pm.advance(Phase::Daybreak, 1, None).unwrap();
        pm.advance(Phase::DayTalk, 1, None).unwrap();
        pm.advance(Phase::Vote, 1, None).unwrap();
        pm.advance(Phase::Night, 1, Some("round 1 complete")).unwrap();
        pm.advance(Phase::Daybreak, 2, None).unwrap();
        pm.advance(Phase::Postgame, 2, Some("villagers win")).unwrap();

        assert!(pm.is_terminal());
        assert_eq!(pm.transitions().len(), 6);
        assert_eq!(pm.transitions()[5].reason.as_deref(), Some("villagers win"));
        assert_eq!(
            pm.summary(),
            "NIGHT → DAYBREAK → DAY_TALK → VOTE → NIGHT → DAYBREAK → POSTGAME"
        );
    }

    #[test]
    fn test_postgame_from_any_live_phase() {
        for phase in [Phase::Night, Phase::Daybreak, Phase::DayTalk, Phase::Vote] {
            assert!(is_legal_transition(phase, Phase::Postgame), "{phase}");
        }
    }

    #[test]
    fn test_cannot_leave_postgame() {
        let mut pm = PhaseMachine::new();
        pm.advance(Phase::Postgame, 1, None).unwrap();
        for phase in [Phase::Night, Phase::Daybreak, Phase::Postgame] {
            let err = pm.advance(phase, 1, None).unwrap_err();
            assert!(matches!(
                err,
                MatchError::IllegalTransition { from: Phase::Postgame, .. }
            ));
        }
    }

    #[test]
    fn test_illegal_skip_and_backward() {
        let mut pm = PhaseMachine::new();
        assert!(pm.advance(Phase::Vote, 1, None).is_err());
        pm.advance(Phase::Daybreak, 1, None).unwrap();
        assert!(pm.advance(Phase::Night, 1, None).is_err());
        assert_eq!(pm.current(), Phase::Daybreak);
        assert_eq!(pm.transitions().len(), 1);
    }

    #[test]
    fn test_display_matches_phase_names() {
        assert_eq!(Phase::DayTalk.to_string(), "DAY_TALK");
        assert_eq!(
            serde_json::to_string(&Phase::DayTalk).unwrap(),
            "\"day_talk\""
        );
    }
}
