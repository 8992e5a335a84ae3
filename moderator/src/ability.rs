//! Reactive abilities fired by a death. The hunter is the only one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::{Metadata, Stage};
use crate::directive::{self, Directive, Keyword};
use crate::error::MatchResult;
use crate::roster::SeatId;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Wolf kill or witch poison.
    Night,
    Lynch,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Night => write!(f, "night"),
            Self::Lynch => write!(f, "lynch"),
        }
    }
}

/// A retaliatory shot that killed someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    pub hunter: SeatId,
    pub target: SeatId,
    pub cause: DeathCause,
}

/// Give a freshly dead seat its reactive ability, if it has one left.
///
/// The seat is queried even though it is dead. The ability is spent whether
/// or not a shot is taken. A seat killed by the shot does not trigger
/// abilities of its own.
pub async fn trigger(
    table: &mut Table<'_>,
    seat: SeatId,
    cause: DeathCause,
) -> MatchResult<Option<Shot>> {
    if !table.state.roster.player(seat)?.private.hunter_ready() {
        return Ok(None);
    }

    let round = table.state.round;
    let meta = Metadata::new()
        .with("alive_map", table.state.roster.alive_map())
        .with("alive_targets", table.state.roster.alive_seats())
        .with("cause", cause);
    let reply = table.interact(seat, Stage::HunterTrigger, meta).await?;
    table.state.roster.player_mut(seat)?.private.mark_hunter_fired();

    let decision = reply
        .as_deref()
        .map_or(Directive::Pass, |r| directive::first_of(r, &[Keyword::Shoot]));
    let target = decision
        .target()
        .filter(|t| table.state.roster.is_alive(*t));
    let Some(target) = target else {
        info!(round, seat, %cause, "Hunter held fire");
        return Ok(None);
    };

    table.state.roster.kill(target)?;
    table
        .state
        .chronicle
        .refresh_global_summary(format!("Hunter seat {seat} shot seat {target}"));
    info!(round, seat, target, %cause, "Hunter fired");

    let shot = Shot {
        hunter: seat,
        target,
        cause,
    };
    table.state.shots.push(shot);
    Ok(Some(shot))
}
