//! Scripted in-process agents shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use moderator::{AgentError, AgentPort, Role, SeatConfig, SeatId, Stage, StageCall};

pub type CallLog = Arc<Mutex<Vec<StageCall>>>;

type Respond = Box<dyn FnMut(&StageCall) -> Result<Option<String>, AgentError> + Send>;

/// Agent whose every reply comes from a closure. Calls are recorded in a
/// shared log so tests can inspect them after the agent is boxed.
pub struct ScriptedAgent {
    respond: Respond,
    log: CallLog,
}

impl ScriptedAgent {
    pub fn new(
        mut respond: impl FnMut(&StageCall) -> Option<String> + Send + 'static,
    ) -> (Self, CallLog) {
        Self::fallible(move |call| Ok(respond(call)))
    }

    pub fn fallible(
        respond: impl FnMut(&StageCall) -> Result<Option<String>, AgentError> + Send + 'static,
    ) -> (Self, CallLog) {
        let log = CallLog::default();
        let agent = Self {
            respond: Box::new(respond),
            log: Arc::clone(&log),
        };
        (agent, log)
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    async fn decide(&mut self, call: &StageCall) -> Result<Option<String>, AgentError> {
        self.log.lock().unwrap().push(call.clone());
        (self.respond)(call)
    }
}

/// Two wolves, a witch, a hunter and two villagers on seats 1..=6.
pub fn six_seat_plan() -> Vec<SeatConfig> {
    vec![
        SeatConfig::new(1, Role::Wolf, "calm commentator", "plain"),
        SeatConfig::new(2, Role::Wolf, "sharp debater", "northern"),
        SeatConfig::new(3, Role::Witch, "cheerful streamer", "southern"),
        SeatConfig::new(4, Role::Hunter, "steady analyst", "coastal"),
        SeatConfig::new(5, Role::Villager, "gloomy poet", "river"),
        SeatConfig::new(6, Role::Villager, "old captain", "island"),
    ]
}

pub fn stages(log: &CallLog, round: u32, stage: Stage) -> Vec<SeatId> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| c.round == round && c.stage == stage)
        .map(|c| c.seat)
        .collect()
}
