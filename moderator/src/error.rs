//! Error taxonomy for the moderator.
//!
//! Agents and prompt renderers report their own narrow errors; the scheduler
//! folds them into [`MatchError`]. A `MatchError` escaping a phase means the
//! phase was rolled back and the match sits at its last committed state.
//!
//! | Variant            | Source                    | Configuration defect |
//! |--------------------|---------------------------|----------------------|
//! | `Agent`            | agent transport/protocol  | no                   |
//! | `Prompt`           | template lookup/render    | yes                  |
//! | `InvalidSeating`   | roster setup              | yes                  |
//! | `Invariant`        | resolver boundary guard   | no                   |
//! | `AlreadyFinished`  | stepping a finished match | no                   |
//! | `IllegalTransition`| phase table               | no                   |

use thiserror::Error;

use crate::phase::Phase;
use crate::roster::SeatId;

/// Failure reported by an [`AgentPort`](crate::agent::AgentPort) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The agent backend could not be reached or failed mid-request.
    #[error("agent transport failure: {0}")]
    Transport(String),

    /// The backend answered with something that is not a reply at all.
    #[error("agent protocol failure: {0}")]
    Protocol(String),
}

/// Failure reported by a [`PromptRenderer`](crate::agent::PromptRenderer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("prompt template not found: {0}")]
    NotFound(String),

    #[error("prompt template {template} references missing placeholder {{{key}}}")]
    MissingPlaceholder { template: String, key: String },
}

/// Unified error for every scheduler and resolver operation.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The seating plan violates a setup rule (duplicate ids, no wolves, ...).
    #[error("invalid seating plan: {0}")]
    InvalidSeating(String),

    /// A resolver boundary guard tripped. Not expected in normal play.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("match already finished after round {round}")]
    AlreadyFinished { round: u32 },

    #[error("illegal phase transition: {from} → {to}")]
    IllegalTransition { from: Phase, to: Phase },
}

impl MatchError {
    /// Build an `Invariant` error for a seat that does not exist.
    pub fn unknown_seat(seat: SeatId) -> Self {
        Self::Invariant(format!("seat {seat} does not exist"))
    }

    /// Whether this error points at a defect in configuration rather than
    /// a runtime failure. Transports report these as server-side defects.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(self, Self::Prompt(_) | Self::InvalidSeating(_))
    }
}

/// Result alias used throughout the moderator.
pub type MatchResult<T> = Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_errors_are_configuration_defects() {
        let err: MatchError = PromptError::NotFound("stage_vote".into()).into();
        assert!(err.is_configuration_defect());
        assert_eq!(err.to_string(), "prompt template not found: stage_vote");
    }

    #[test]
    fn agent_errors_are_not_configuration_defects() {
        let err: MatchError = AgentError::Transport("connection refused".into()).into();
        assert!(!err.is_configuration_defect());
    }

    #[test]
    fn missing_placeholder_names_the_key() {
        let err = PromptError::MissingPlaceholder {
            template: "stage_vote".into(),
            key: "alive_map".into(),
        };
        assert_eq!(
            err.to_string(),
            "prompt template stage_vote references missing placeholder {alive_map}"
        );
    }

    #[test]
    fn unknown_seat_is_an_invariant() {
        let err = MatchError::unknown_seat(9);
        assert!(matches!(err, MatchError::Invariant(_)));
        assert!(err.to_string().contains("seat 9"));
    }
}
