//! Werewolf Moderator Library
//!
//! This library provides the round orchestration state machine for a
//! seat-based social-deduction game:
//! - A fixed roster of seats with hidden roles and role-private capabilities
//! - Night, daybreak, day-talk and vote resolvers, plus the hunter's
//!   single-use retaliation
//! - A scheduler that advances one phase at a time or runs to completion,
//!   rolling a failed phase back to its last committed state
//!
//! Decisions come from an [`AgentPort`]; prompt text, if wanted, from a
//! [`PromptRenderer`]. Neither does I/O here: transports and concrete agents
//! live in the `werewolf-agents` crate.
//!
//! # Usage
//!
//! ```ignore
//! let rng = MatchRng::seeded(42);
//! let mut moderator = Moderator::new(&plan, Box::new(agent), rng)?.with_max_rounds(10);
//! while !moderator.is_finished() {
//!     let report = moderator.step().await?;
//!     println!("{report:?}");
//! }
//! ```

pub mod ability;
pub mod agent;
pub mod chronicle;
pub mod day;
pub mod daybreak;
pub mod directive;
pub mod error;
pub mod night;
pub mod phase;
pub mod rng;
pub mod roster;
pub mod scheduler;
pub mod state;
pub mod table;
pub mod vote;
pub mod win;

#[cfg(test)]
mod testing;

pub use agent::{AgentPort, Metadata, PromptRenderer, Stage, StageCall, StageLog};
pub use chronicle::{Chronicle, Digest, NightEvent, RoundRecord};
pub use directive::{Directive, Keyword};
pub use error::{AgentError, MatchError, MatchResult, PromptError};
pub use night::NightOutcome;
pub use phase::{Phase, TransitionRecord};
pub use rng::MatchRng;
pub use roster::{Faction, PotionState, Role, RolePrivate, Roster, SeatConfig, SeatId};
pub use scheduler::{
    MatchSnapshot, MatchStats, MatchStatus, Moderator, PublicSeat, SeatView, StepReport,
    DEFAULT_MAX_ROUNDS,
};
pub use vote::VoteRecord;
pub use win::{FinishReason, GameResult};
