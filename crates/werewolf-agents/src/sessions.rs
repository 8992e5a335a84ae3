//! In-process store of running matches.
//!
//! Each match lives behind its own async mutex, so steps on different
//! matches run concurrently while steps on one match are serialized. The
//! registry map itself is only locked long enough to find a match.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use moderator::{
    GameResult, MatchError, MatchSnapshot, MatchStatus, Moderator, Phase, SeatId, SeatView,
    StepReport,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::MatchFactory;
use crate::telemetry::{self, MatchMetrics};

pub type MatchId = Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("match {0} not found")]
    NotFound(MatchId),

    #[error("match {id} has no seat {seat}")]
    UnknownSeat { id: MatchId, seat: SeatId },

    #[error(transparent)]
    Match(#[from] MatchError),

    /// The match could not be built from the configuration.
    #[error("match setup failed: {0:#}")]
    Setup(anyhow::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One row of the match listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: MatchId,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub round: u32,
    pub phase: Phase,
    pub finished: bool,
    pub result: GameResult,
}

/// Result of running a match to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub id: MatchId,
    pub steps: Vec<StepReport>,
    pub status: MatchStatus,
}

struct MatchSession {
    id: MatchId,
    seed: u64,
    created_at: DateTime<Utc>,
    started: Instant,
    moderator: Moderator,
}

impl MatchSession {
    fn summary(&self) -> MatchSummary {
        MatchSummary {
            id: self.id,
            seed: self.seed,
            created_at: self.created_at,
            round: self.moderator.round(),
            phase: self.moderator.phase(),
            finished: self.moderator.is_finished(),
            result: self.moderator.result(),
        }
    }

    fn metrics(&self) -> MatchMetrics {
        MatchMetrics::from_moderator(
            &self.id.to_string(),
            self.seed,
            &self.moderator,
            self.started.elapsed(),
        )
    }
}

pub struct MatchRegistry {
    factory: MatchFactory,
    matches: RwLock<HashMap<MatchId, Arc<Mutex<MatchSession>>>>,
    telemetry_log: Option<PathBuf>,
}

impl MatchRegistry {
    pub fn new(factory: MatchFactory) -> Self {
        Self {
            factory,
            matches: RwLock::new(HashMap::new()),
            telemetry_log: None,
        }
    }

    /// Append metrics of every match that finishes to this JSONL file.
    pub fn with_telemetry_log(mut self, path: PathBuf) -> Self {
        self.telemetry_log = Some(path);
        self
    }

    async fn lookup(&self, id: MatchId) -> SessionResult<Arc<Mutex<MatchSession>>> {
        self.matches
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    fn record_if_finished(&self, session: &MatchSession) {
        if !session.moderator.is_finished() {
            return;
        }
        info!(
            id = %session.id,
            result = %session.moderator.result(),
            rounds = session.moderator.round(),
            "Match reached postgame"
        );
        if let Some(path) = &self.telemetry_log {
            telemetry::append_telemetry(&session.metrics(), path);
        }
    }

    pub async fn create(&self, seed: Option<u64>) -> SessionResult<MatchSummary> {
        let seed = self.factory.pick_seed(seed);
        let moderator = self.factory.build(seed).map_err(SessionError::Setup)?;
        let session = MatchSession {
            id: Uuid::new_v4(),
            seed,
            created_at: Utc::now(),
            started: Instant::now(),
            moderator,
        };
        let summary = session.summary();
        self.matches
            .write()
            .await
            .insert(session.id, Arc::new(Mutex::new(session)));
        info!(id = %summary.id, seed, "Match created");
        Ok(summary)
    }

    /// Every match, oldest first.
    pub async fn list(&self) -> Vec<MatchSummary> {
        let sessions: Vec<_> = self.matches.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(session.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    pub async fn summary(&self, id: MatchId) -> SessionResult<MatchSummary> {
        Ok(self.lookup(id).await?.lock().await.summary())
    }

    pub async fn status(&self, id: MatchId) -> SessionResult<MatchStatus> {
        Ok(self.lookup(id).await?.lock().await.moderator.status())
    }

    /// Advance one phase. A failed phase leaves the match at its last
    /// committed state.
    pub async fn advance(&self, id: MatchId) -> SessionResult<StepReport> {
        let handle = self.lookup(id).await?;
        let mut session = handle.lock().await;
        let report = session.moderator.step().await.inspect_err(|e| {
            warn!(id = %id, error = %e, "Step failed");
        })?;
        self.record_if_finished(&session);
        Ok(report)
    }

    pub async fn run(&self, id: MatchId) -> SessionResult<RunReport> {
        let handle = self.lookup(id).await?;
        let mut session = handle.lock().await;
        if session.moderator.is_finished() {
            return Err(MatchError::AlreadyFinished {
                round: session.moderator.round(),
            }
            .into());
        }
        let steps = session.moderator.run_to_completion().await.inspect_err(|e| {
            warn!(id = %id, error = %e, "Run stopped");
        })?;
        self.record_if_finished(&session);
        Ok(RunReport {
            id,
            steps,
            status: session.moderator.status(),
        })
    }

    pub async fn snapshot(&self, id: MatchId) -> SessionResult<MatchSnapshot> {
        Ok(self.lookup(id).await?.lock().await.moderator.snapshot())
    }

    pub async fn seat_view(&self, id: MatchId, seat: SeatId) -> SessionResult<SeatView> {
        let handle = self.lookup(id).await?;
        let session = handle.lock().await;
        if !session.moderator.roster().contains(seat) {
            return Err(SessionError::UnknownSeat { id, seat });
        }
        Ok(session.moderator.seat_view(seat)?)
    }

    pub async fn metrics(&self, id: MatchId) -> SessionResult<MatchMetrics> {
        Ok(self.lookup(id).await?.lock().await.metrics())
    }

    pub async fn dispose(&self, id: MatchId) -> SessionResult<()> {
        self.matches
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        info!(id = %id, "Match disposed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }
}
