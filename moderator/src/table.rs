//! The one "interact with seat for stage X" primitive every resolver uses.

use serde_json::json;
use tracing::debug;

use crate::agent::{AgentPort, Metadata, PromptRenderer, Stage, StageCall, StageLog};
use crate::directive;
use crate::error::MatchResult;
use crate::rng::MatchRng;
use crate::roster::{Player, SeatId};
use crate::state::MatchState;

/// How much time the table has for a phase, as shown to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Short,
    Moderate,
}

impl Pace {
    fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Moderate => "moderate",
        }
    }
}

/// Payload of the `stage_context` briefing.
#[derive(Debug, Clone)]
pub struct Briefing {
    /// Label of the sub-phase, e.g. `NIGHT_WOLVES`.
    pub label: &'static str,
    pub speaker_order: Vec<SeatId>,
    pub turn_index: usize,
    pub is_first_in_round: bool,
    pub pace: Pace,
    pub total_speakers: Option<usize>,
}

impl Briefing {
    pub fn new(label: &'static str, speaker_order: Vec<SeatId>, pace: Pace) -> Self {
        Self {
            label,
            speaker_order,
            turn_index: 0,
            is_first_in_round: false,
            pace,
            total_speakers: None,
        }
    }

    pub fn turn(mut self, turn_index: usize, is_first_in_round: bool) -> Self {
        self.turn_index = turn_index;
        self.is_first_in_round = is_first_in_round;
        self.total_speakers = Some(self.speaker_order.len());
        self
    }
}

/// Borrowed view of a running match handed to the resolvers.
pub struct Table<'a> {
    pub state: &'a mut MatchState,
    pub agent: &'a mut dyn AgentPort,
    pub prompts: Option<&'a dyn PromptRenderer>,
    pub rng: &'a MatchRng,
}

impl Table<'_> {
    /// Render, ask, record. Replies to briefing stages are dropped.
    pub async fn interact(
        &mut self,
        seat: SeatId,
        stage: Stage,
        metadata: Metadata,
    ) -> MatchResult<Option<String>> {
        let prompt = match self.prompts {
            Some(renderer) => Some(renderer.render(stage, &metadata)?),
            None => None,
        };
        let call = StageCall {
            seat,
            round: self.state.round,
            stage,
            metadata,
            prompt,
            expect_reply: stage.expects_reply(),
        };

        let reply = self.agent.decide(&call).await?;
        let reply = reply.filter(|_| call.expect_reply);

        debug!(
            round = call.round,
            seat,
            stage = %stage,
            replied = reply.is_some(),
            "Stage interaction"
        );

        self.state.transcript.push(StageLog {
            round: call.round,
            seat,
            stage,
            prompt: call.prompt,
            reply: reply.clone(),
        });
        Ok(reply)
    }

    /// Aliveness probe. Returns `true` when the seat answered with the skip
    /// sentinel.
    pub async fn probe(&mut self, seat: SeatId) -> MatchResult<bool> {
        let alive = self.state.roster.is_alive(seat);
        let reply = self
            .interact(seat, Stage::LifeCheck, Metadata::new().with("is_alive", alive))
            .await?;
        Ok(directive::is_skip(reply.as_deref()))
    }

    /// Context, chronicle digest and personal notes, in that order.
    pub async fn brief(&mut self, seat: SeatId, briefing: Briefing) -> MatchResult<()> {
        let mut context = Metadata::new()
            .with("round", self.state.round)
            .with("stage", briefing.label)
            .with("speaker_order", &briefing.speaker_order)
            .with("turn_index", briefing.turn_index)
            .with("is_first_in_round", briefing.is_first_in_round)
            .with("alive_map", self.state.roster.alive_map())
            .with("time_left", briefing.pace.as_str());
        if let Some(total) = briefing.total_speakers {
            context.insert("total_speakers", total);
        }
        self.interact(seat, Stage::Context, context).await?;

        let digest = self.state.chronicle.digest().to_metadata();
        self.interact(seat, Stage::ChronicleDigest, digest).await?;

        let notes = notes_payload(self.state.roster.player(seat)?);
        self.interact(seat, Stage::YourNotes, notes).await?;
        Ok(())
    }
}

/// Private briefing for one seat: persona, role capabilities, recent notes.
pub fn notes_payload(player: &Player) -> Metadata {
    let recent: Vec<String> = player
        .notes()
        .iter()
        .rev()
        .take(3)
        .rev()
        .map(|note| note.bullets.join("; "))
        .collect();
    Metadata::new()
        .with("persona", &player.persona)
        .with("dialect_hint", &player.dialect)
        .with(
            "private_role",
            json!({
                "role": player.role,
                "allies": player.private.allies(),
                "potions": player.private.potions(),
            }),
        )
        .with("recent_notes", recent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockAgentPort;
    use crate::roster::{NoteEntry, NotePhase, Roster};
    use crate::testing::{six_seat_plan, ScriptedAgent};

    fn state() -> MatchState {
        MatchState::new(Roster::from_seating(&six_seat_plan()).unwrap())
    }

    #[tokio::test]
    async fn interact_records_transcript_and_drops_briefing_replies() {
        let mut state = state();
        let mut agent = ScriptedAgent::new(|_| Some("chatter".into()));
        let rng = MatchRng::seeded(1);
        let mut table = Table {
            state: &mut state,
            agent: &mut agent,
            prompts: None,
            rng: &rng,
        };

        let reply = table.interact(3, Stage::Context, Metadata::new()).await.unwrap();
        assert_eq!(reply, None);
        let reply = table.interact(3, Stage::DayTalk, Metadata::new()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("chatter"));

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].reply, None);
        assert_eq!(state.transcript[1].stage, Stage::DayTalk);
    }

    #[tokio::test]
    async fn probe_detects_skip() {
        let mut state = state();
        let mut agent = MockAgentPort::new();
        agent
            .expect_decide()
            .withf(|call| call.stage == Stage::LifeCheck && call.metadata.get_bool("is_alive") == Some(true))
            .times(1)
            .returning(|_| Ok(Some("[SKIP]".into())));
        let rng = MatchRng::seeded(1);
        let mut table = Table {
            state: &mut state,
            agent: &mut agent,
            prompts: None,
            rng: &rng,
        };
        assert!(table.probe(1).await.unwrap());
    }

    #[tokio::test]
    async fn brief_sends_three_stages_in_order() {
        let mut state = state();
        let mut agent = ScriptedAgent::new(|_| None);
        let rng = MatchRng::seeded(1);
        let mut table = Table {
            state: &mut state,
            agent: &mut agent,
            prompts: None,
            rng: &rng,
        };
        table
            .brief(2, Briefing::new("VOTE", vec![1, 2, 3], Pace::Short))
            .await
            .unwrap();
        assert_eq!(
            agent.stages_for(2),
            vec![Stage::Context, Stage::ChronicleDigest, Stage::YourNotes]
        );
        let context = &agent.calls[0].metadata;
        assert_eq!(context.get_str("stage"), Some("VOTE"));
        assert_eq!(context.get_str("time_left"), Some("short"));
        assert!(context.get("total_speakers").is_none());
    }

    #[test]
    fn notes_payload_shows_only_own_capabilities() {
        let mut roster = Roster::from_seating(&six_seat_plan()).unwrap();
        let wolf = roster.player_mut(1).unwrap();
        for round in 1..=4 {
            wolf.push_note(NoteEntry {
                round,
                phase: NotePhase::Day,
                bullets: vec![format!("r{round}a"), format!("r{round}b")],
            });
        }
        let payload = notes_payload(roster.player(1).unwrap());
        let private = payload.get("private_role").unwrap();
        assert_eq!(private["allies"], json!([2]));
        assert!(private["potions"].is_null());
        assert_eq!(
            payload.get("recent_notes").unwrap(),
            &json!(["r2a; r2b", "r3a; r3b", "r4a; r4b"])
        );
    }
}
