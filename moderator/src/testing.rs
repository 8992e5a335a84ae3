//! Shared fixtures for unit tests.

use async_trait::async_trait;

use crate::agent::{AgentPort, Stage, StageCall};
use crate::error::AgentError;
use crate::roster::{Role, SeatConfig, SeatId};

/// Two wolves, a witch, a hunter and two villagers on seats 1..=6.
pub(crate) fn six_seat_plan() -> Vec<SeatConfig> {
    vec![
        SeatConfig::new(1, Role::Wolf, "calm commentator", "plain"),
        SeatConfig::new(2, Role::Wolf, "sharp debater", "northern"),
        SeatConfig::new(3, Role::Witch, "cheerful streamer", "southern"),
        SeatConfig::new(4, Role::Hunter, "steady analyst", "coastal"),
        SeatConfig::new(5, Role::Villager, "gloomy poet", "river"),
        SeatConfig::new(6, Role::Villager, "old captain", "island"),
    ]
}

type Script = Box<dyn FnMut(&StageCall) -> Option<String> + Send>;

/// Agent driven by a closure; records every call it receives.
pub(crate) struct ScriptedAgent {
    script: Script,
    pub calls: Vec<StageCall>,
}

impl ScriptedAgent {
    pub fn new(script: impl FnMut(&StageCall) -> Option<String> + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Vec::new(),
        }
    }

    pub fn stages_for(&self, seat: SeatId) -> Vec<Stage> {
        self.calls
            .iter()
            .filter(|c| c.seat == seat)
            .map(|c| c.stage)
            .collect()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls.iter().filter(|c| c.stage == stage).count()
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    async fn decide(&mut self, call: &StageCall) -> Result<Option<String>, AgentError> {
        self.calls.push(call.clone());
        Ok((self.script)(call))
    }
}
