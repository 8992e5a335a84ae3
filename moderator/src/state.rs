//! Everything a match owns, in one cloneable value.
//!
//! The scheduler snapshots a `MatchState` before each phase and puts the
//! snapshot back if the phase fails, so nothing here may hold handles to
//! outside resources.

use serde::Serialize;

use crate::ability::Shot;
use crate::agent::StageLog;
use crate::chronicle::Chronicle;
use crate::error::MatchResult;
use crate::night::NightOutcome;
use crate::phase::{Phase, PhaseMachine};
use crate::roster::Roster;
use crate::vote::VoteRecord;
use crate::win::{FinishReason, GameResult};

#[derive(Debug, Clone, Serialize)]
pub struct MatchState {
    pub roster: Roster,
    pub chronicle: Chronicle,
    pub round: u32,
    pub phases: PhaseMachine,
    /// Rebuilt every night, consumed at daybreak.
    pub night: Option<NightOutcome>,
    /// The current round's vote once cast.
    pub last_vote: Option<VoteRecord>,
    pub result: GameResult,
    pub finish_reason: Option<FinishReason>,
    pub transcript: Vec<StageLog>,
    /// Every reactive shot that killed a seat.
    pub shots: Vec<Shot>,
    /// Wolf introductions are sent once, on the first step.
    pub setup_done: bool,
}

impl MatchState {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            chronicle: Chronicle::new(),
            round: 1,
            phases: PhaseMachine::new(),
            night: None,
            last_vote: None,
            result: GameResult::Ongoing,
            finish_reason: None,
            transcript: Vec::new(),
            shots: Vec::new(),
            setup_done: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phases.current()
    }

    pub fn is_finished(&self) -> bool {
        self.phases.is_terminal()
    }

    pub fn advance(&mut self, to: Phase, reason: Option<&str>) -> MatchResult<()> {
        self.phases.advance(to, self.round, reason)
    }
}
