//! The round scheduler.
//!
//! A [`Moderator`] owns one match and advances it one phase per [`step`]
//! call, or all the way with [`run_to_completion`].
//!
//! ## Lifecycle
//!
//! ```text
//! step()  NIGHT            wolves + witch            → DAYBREAK
//! step()  DAYBREAK         deaths + hunter, win check → DAY_TALK | POSTGAME
//! step()  DAY_TALK + VOTE  talk, vote, lynch, win check,
//!                          round cap                  → NIGHT (round+1) | POSTGAME
//! ```
//!
//! Every step is atomic: the match state and the random source are
//! checkpointed first and restored if anything inside the step fails.
//!
//! [`step`]: Moderator::step
//! [`run_to_completion`]: Moderator::run_to_completion

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ability::Shot;
use crate::agent::{AgentPort, Metadata, PromptRenderer, Stage, StageLog};
use crate::chronicle::Chronicle;
use crate::error::{MatchError, MatchResult};
use crate::phase::{Phase, TransitionRecord};
use crate::rng::MatchRng;
use crate::roster::{NoteEntry, Role, RolePrivate, Roster, SeatConfig, SeatId};
use crate::state::MatchState;
use crate::table::Table;
use crate::win::{self, FinishReason, GameResult};
use crate::{day, daybreak, night, vote};

/// Round cap used when none is configured.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

// ── Reports and views ────────────────────────────────────────────────────────

/// What one `step()` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Round the step ran in.
    pub round: u32,
    /// Phase executed. `DayTalk` covers the vote that follows it;
    /// `Postgame` means the round cap ended the match before a night began.
    pub executed: Phase,
    /// Every seat that died during the step, in order.
    pub deaths: Vec<SeatId>,
    pub shots: Vec<Shot>,
    pub lynched: Option<SeatId>,
    pub finished: bool,
    pub result: GameResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StepReport {
    fn new(round: u32, executed: Phase) -> Self {
        Self {
            round,
            executed,
            deaths: Vec::new(),
            shots: Vec::new(),
            lynched: None,
            finished: false,
            result: GameResult::Ongoing,
            finish_reason: None,
        }
    }

    fn record_shots(&mut self, shots: impl IntoIterator<Item = Shot>) {
        for shot in shots {
            self.deaths.push(shot.target);
            self.shots.push(shot);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatus {
    pub round: u32,
    pub phase: Phase,
    pub alive_seats: Vec<SeatId>,
    pub wolves_alive: usize,
    pub villagers_alive: usize,
    pub finished: bool,
    pub result: GameResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// A seat as anyone at the table sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSeat {
    pub seat: SeatId,
    pub persona: String,
    pub dialect: String,
    pub alive: bool,
    /// Revealed once the match is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Everything one seat is allowed to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: SeatId,
    pub role: Role,
    pub persona: String,
    pub dialect: String,
    pub alive: bool,
    pub private: RolePrivate,
    pub trust: BTreeMap<SeatId, i32>,
    pub notes: Vec<NoteEntry>,
    pub table: Vec<PublicSeat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub round: u32,
    pub phase: Phase,
    pub result: GameResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    pub seats: Vec<PublicSeat>,
    pub chronicle: Chronicle,
}

/// Counters for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub rounds_played: u32,
    pub deaths: usize,
    pub lynches: usize,
    pub hunter_shots: usize,
    pub stage_calls: usize,
}

// ── Moderator ────────────────────────────────────────────────────────────────

/// Owns one match: its state, its agent port and its random source.
pub struct Moderator {
    state: MatchState,
    agent: Box<dyn AgentPort>,
    prompts: Option<Arc<dyn PromptRenderer>>,
    rng: MatchRng,
    max_rounds: u32,
}

impl Moderator {
    /// Seat a new match at `NIGHT`, round 1.
    ///
    /// # Errors
    ///
    /// [`MatchError::InvalidSeating`] if the plan is unusable.
    pub fn new(plan: &[SeatConfig], agent: Box<dyn AgentPort>, rng: MatchRng) -> MatchResult<Self> {
        let roster = Roster::from_seating(plan)?;
        Ok(Self {
            state: MatchState::new(roster),
            agent,
            prompts: None,
            rng,
            max_rounds: DEFAULT_MAX_ROUNDS,
        })
    }

    /// Render a prompt for every stage before it is sent.
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptRenderer>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn rng(&self) -> &MatchRng {
        &self.rng
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn result(&self) -> GameResult {
        self.state.result
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.state.finish_reason
    }

    pub fn roster(&self) -> &Roster {
        &self.state.roster
    }

    pub fn chronicle(&self) -> &Chronicle {
        &self.state.chronicle
    }

    pub fn transcript(&self) -> &[StageLog] {
        &self.state.transcript
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        self.state.phases.transitions()
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Advance exactly one phase.
    ///
    /// # Errors
    ///
    /// [`MatchError::AlreadyFinished`] once the match is over. Any other
    /// error means the phase was rolled back to its starting state.
    pub async fn step(&mut self) -> MatchResult<StepReport> {
        if self.state.is_finished() {
            return Err(MatchError::AlreadyFinished {
                round: self.state.round,
            });
        }

        let checkpoint = self.state.clone();
        let rng_checkpoint = self.rng.checkpoint();
        match self.execute_phase().await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(
                    round = checkpoint.round,
                    phase = %checkpoint.phase(),
                    error = %err,
                    "Phase failed, rolled back"
                );
                self.state = checkpoint;
                self.rng.restore(rng_checkpoint);
                Err(err)
            }
        }
    }

    /// Step until the match reaches postgame.
    pub async fn run_to_completion(&mut self) -> MatchResult<Vec<StepReport>> {
        let mut reports = Vec::new();
        while !self.state.is_finished() {
            reports.push(self.step().await?);
        }
        Ok(reports)
    }

    async fn execute_phase(&mut self) -> MatchResult<StepReport> {
        let max_rounds = self.max_rounds;
        let mut table = Table {
            state: &mut self.state,
            agent: &mut *self.agent,
            prompts: self.prompts.as_deref(),
            rng: &self.rng,
        };

        if !table.state.setup_done {
            wolf_intro(&mut table).await?;
            table.state.setup_done = true;
        }

        let round = table.state.round;
        let mut report = StepReport::new(round, table.state.phase());

        match table.state.phase() {
            Phase::Night if round > max_rounds => {
                report.executed = Phase::Postgame;
                finish(&mut table, GameResult::Ongoing, FinishReason::RoundCap).await?;
            }
            Phase::Night => {
                night::resolve_night(&mut table).await?;
                table.state.advance(Phase::Daybreak, None)?;
            }
            Phase::Daybreak => {
                let daybreak = daybreak::resolve_daybreak(&mut table).await?;
                report.deaths = daybreak.deaths;
                report.record_shots(daybreak.shots);

                let result = win::evaluate(&table.state.roster);
                match result.winner() {
                    Some(faction) => {
                        finish(&mut table, result, FinishReason::Victory(faction)).await?
                    }
                    None => table.state.advance(Phase::DayTalk, None)?,
                }
            }
            Phase::DayTalk => {
                let order = day::resolve_day_talk(&mut table).await?;
                table.state.advance(Phase::Vote, None)?;
                let vote = vote::resolve_vote(&mut table, &order).await?;
                report.deaths.extend(vote.lynched);
                report.lynched = vote.lynched;
                report.record_shots(vote.shot);

                let result = win::evaluate(&table.state.roster);
                if let Some(faction) = result.winner() {
                    finish(&mut table, result, FinishReason::Victory(faction)).await?;
                } else if round >= max_rounds {
                    finish(&mut table, result, FinishReason::RoundCap).await?;
                } else {
                    let reason = format!("round {round} complete");
                    table.state.advance(Phase::Night, Some(&reason))?;
                    table.state.round += 1;
                }
            }
            Phase::Vote => {
                return Err(MatchError::Invariant(
                    "a step cannot start at VOTE; it runs with DAY_TALK".into(),
                ))
            }
            Phase::Postgame => return Err(MatchError::AlreadyFinished { round }),
        }

        report.finished = table.state.is_finished();
        report.result = table.state.result;
        report.finish_reason = table.state.finish_reason;
        Ok(report)
    }

    // ── Views ────────────────────────────────────────────────────────────────

    pub fn status(&self) -> MatchStatus {
        let (wolves_alive, villagers_alive) = self.state.roster.faction_counts();
        MatchStatus {
            round: self.state.round,
            phase: self.state.phase(),
            alive_seats: self.state.roster.alive_seats(),
            wolves_alive,
            villagers_alive,
            finished: self.state.is_finished(),
            result: self.state.result,
            finish_reason: self.state.finish_reason,
        }
    }

    /// Every seat's public face. Roles stay hidden until the match is over.
    pub fn public_seats(&self) -> Vec<PublicSeat> {
        let reveal = self.state.is_finished();
        self.state
            .roster
            .players()
            .map(|p| PublicSeat {
                seat: p.seat_id,
                persona: p.persona.clone(),
                dialect: p.dialect.clone(),
                alive: p.is_alive(),
                role: reveal.then_some(p.role),
            })
            .collect()
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            round: self.state.round,
            phase: self.state.phase(),
            result: self.state.result,
            finish_reason: self.state.finish_reason,
            seats: self.public_seats(),
            chronicle: self.state.chronicle.clone(),
        }
    }

    /// What `seat` knows: its own role and private state plus the public
    /// table.
    pub fn seat_view(&self, seat: SeatId) -> MatchResult<SeatView> {
        let player = self.state.roster.player(seat)?;
        Ok(SeatView {
            seat,
            role: player.role,
            persona: player.persona.clone(),
            dialect: player.dialect.clone(),
            alive: player.is_alive(),
            private: player.private.clone(),
            trust: player.trust.clone(),
            notes: player.notes().to_vec(),
            table: self.public_seats(),
        })
    }

    pub fn stats(&self) -> MatchStats {
        MatchStats {
            rounds_played: self.state.round,
            deaths: self.state.roster.len() - self.state.roster.alive_seats().len(),
            lynches: self
                .state
                .chronicle
                .rounds()
                .filter(|r| r.day.lynch.is_some())
                .count(),
            hunter_shots: self.state.shots.len(),
            stage_calls: self.state.transcript.len(),
        }
    }
}

// ── Setup and postgame ───────────────────────────────────────────────────────

/// Tell each wolf who its allies are. No reply expected.
async fn wolf_intro(table: &mut Table<'_>) -> MatchResult<()> {
    for wolf in table.state.roster.wolves_alive() {
        let allies = table.state.roster.player(wolf)?.private.allies().to_vec();
        let allies_text = if allies.is_empty() {
            "no allies".to_string()
        } else {
            allies
                .iter()
                .map(|s| format!("seat {s}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let meta = Metadata::new()
            .with("allies", &allies)
            .with("allies_text", allies_text);
        table.interact(wolf, Stage::WolfIntro, meta).await?;
    }
    Ok(())
}

/// Enter postgame and give every seat, alive or dead, the closing stages.
async fn finish(
    table: &mut Table<'_>,
    result: GameResult,
    reason: FinishReason,
) -> MatchResult<()> {
    table.state.result = result;
    table.state.finish_reason = Some(reason);
    table
        .state
        .advance(Phase::Postgame, Some(&reason.to_string()))?;

    let digest = table.state.chronicle.postgame_digest();
    for seat in table.state.roster.seat_ids() {
        let notes_tail = table
            .state
            .roster
            .player(seat)?
            .notes()
            .last()
            .map(|n| n.bullets.clone())
            .unwrap_or_default();
        let meta = Metadata::new()
            .with("result", result)
            .with("final_transcript_digest", &digest)
            .with("your_notes_tail", notes_tail);
        table.interact(seat, Stage::PostgameContext, meta).await?;
        table
            .interact(seat, Stage::PostgameRoundup, Metadata::new())
            .await?;
        table
            .interact(seat, Stage::PostgameRoast, Metadata::new())
            .await?;
    }

    info!(
        round = table.state.round,
        result = %result,
        reason = %reason,
        "Match finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{six_seat_plan, ScriptedAgent};

    fn moderator(agent: ScriptedAgent) -> Moderator {
        Moderator::new(&six_seat_plan(), Box::new(agent), MatchRng::seeded(42)).unwrap()
    }

    #[tokio::test]
    async fn steps_walk_the_phase_table() {
        let mut m = moderator(ScriptedAgent::new(|_| None));
        assert_eq!(m.phase(), Phase::Night);

        let night = m.step().await.unwrap();
        assert_eq!((night.round, night.executed), (1, Phase::Night));
        assert_eq!(m.phase(), Phase::Daybreak);

        let dawn = m.step().await.unwrap();
        assert_eq!(dawn.executed, Phase::Daybreak);
        assert!(dawn.deaths.is_empty());
        assert_eq!(m.phase(), Phase::DayTalk);

        let day = m.step().await.unwrap();
        assert_eq!(day.executed, Phase::DayTalk);
        assert!(!day.finished);
        assert_eq!(m.phase(), Phase::Night);
        assert_eq!(m.round(), 2);
        assert_eq!(m.transitions().len(), 4);
    }

    #[tokio::test]
    async fn wolf_intro_runs_once() {
        let mut m = moderator(ScriptedAgent::new(|_| None));
        m.step().await.unwrap();
        m.step().await.unwrap();
        let intros = m
            .transcript()
            .iter()
            .filter(|l| l.stage == Stage::WolfIntro)
            .map(|l| l.seat)
            .collect::<Vec<_>>();
        assert_eq!(intros, vec![1, 2]);
    }

    #[tokio::test]
    async fn round_cap_finishes_without_winner() {
        let mut m = moderator(ScriptedAgent::new(|call| {
            // Every vote is invalid, so the first wolf is lynched.
            (call.stage == Stage::Vote).then(|| "pass".to_string())
        }))
        .with_max_rounds(1);

        let reports = m.run_to_completion().await.unwrap();
        assert_eq!(reports.len(), 3);
        let last = reports.last().unwrap();
        assert_eq!(last.lynched, Some(1));
        assert!(last.finished);
        assert_eq!(last.result, GameResult::Ongoing);
        assert_eq!(last.finish_reason, Some(FinishReason::RoundCap));
        assert_eq!(m.round(), 1);
        assert!(m.public_seats().iter().all(|s| s.role.is_some()));
    }

    #[tokio::test]
    async fn zero_round_cap_finishes_on_first_step() {
        let mut m = moderator(ScriptedAgent::new(|_| None)).with_max_rounds(0);
        let report = m.step().await.unwrap();
        assert_eq!(report.executed, Phase::Postgame);
        assert!(report.finished);
        assert_eq!(m.finish_reason(), Some(FinishReason::RoundCap));
    }

    #[tokio::test]
    async fn postgame_reaches_every_seat() {
        let mut m = moderator(ScriptedAgent::new(|_| None)).with_max_rounds(0);
        m.step().await.unwrap();
        for seat in 1..=6 {
            let stages: Vec<_> = m
                .transcript()
                .iter()
                .filter(|l| l.seat == seat && l.stage != Stage::WolfIntro)
                .map(|l| l.stage)
                .collect();
            assert_eq!(
                stages,
                vec![
                    Stage::PostgameContext,
                    Stage::PostgameRoundup,
                    Stage::PostgameRoast
                ]
            );
        }
    }

    #[tokio::test]
    async fn seat_view_hides_other_roles() {
        let m = moderator(ScriptedAgent::new(|_| None));
        let view = m.seat_view(3).unwrap();
        assert_eq!(view.role, Role::Witch);
        assert!(view.private.potions().is_some());
        assert!(view.table.iter().all(|s| s.role.is_none()));
        assert!(matches!(m.seat_view(9), Err(MatchError::Invariant(_))));
    }

    #[tokio::test]
    async fn status_tracks_faction_counts() {
        let m = moderator(ScriptedAgent::new(|_| None));
        let status = m.status();
        assert_eq!(status.alive_seats, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!((status.wolves_alive, status.villagers_alive), (2, 4));
        assert!(!status.finished);
        assert_eq!(m.stats().stage_calls, 0);
    }
}
