//! Daybreak: turn the night outcome into deaths.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ability::{self, DeathCause, Shot};
use crate::error::MatchResult;
use crate::night::NightOutcome;
use crate::roster::{Roster, SeatId};
use crate::table::Table;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaybreakReport {
    /// Night victims in kill-before-poison order.
    pub deaths: Vec<SeatId>,
    pub shots: Vec<Shot>,
}

/// Seats the night outcome kills: the kill target unless healed, then the
/// poison target regardless of any heal. Unknown, dead and repeated seats
/// are dropped.
pub fn death_list(outcome: &NightOutcome, roster: &Roster) -> Vec<SeatId> {
    let killed = outcome
        .kill_target
        .filter(|target| outcome.healed_target != Some(*target));

    let mut deaths = Vec::new();
    for seat in killed.into_iter().chain(outcome.poisoned_target) {
        if roster.is_alive(seat) && !deaths.contains(&seat) {
            deaths.push(seat);
        }
    }
    deaths
}

/// Apply the stored night outcome, then give each victim its reactive
/// ability.
pub async fn resolve_daybreak(table: &mut Table<'_>) -> MatchResult<DaybreakReport> {
    let round = table.state.round;
    let outcome = table.state.night.take().unwrap_or_default();
    let deaths = death_list(&outcome, &table.state.roster);

    for seat in &deaths {
        table.state.roster.kill(*seat)?;
    }
    if deaths.is_empty() {
        info!(round, "Daybreak: nobody died");
    } else {
        info!(round, deaths = ?deaths, "Daybreak: seats fell");
    }

    let mut shots = Vec::new();
    for seat in &deaths {
        if let Some(shot) = ability::trigger(table, *seat, DeathCause::Night).await? {
            shots.push(shot);
        }
    }

    table.state.chronicle.refresh_global_summary(format!(
        "Night {round} resolved: deaths {}",
        describe(&deaths)
    ));

    Ok(DaybreakReport { deaths, shots })
}

fn describe(seats: &[SeatId]) -> String {
    if seats.is_empty() {
        "none".to_string()
    } else {
        seats
            .iter()
            .map(|s| format!("seat {s}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
