//! Night: the wolves pick a victim, then the witch may heal or poison.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::{Metadata, Stage};
use crate::chronicle::NightEvent;
use crate::directive::{self, Keyword};
use crate::error::{MatchError, MatchResult};
use crate::roster::{Role, SeatId};
use crate::table::{Briefing, Pace, Table};

/// What the night decided. Rebuilt every night, consumed at daybreak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightOutcome {
    pub kill_target: Option<SeatId>,
    pub healed_target: Option<SeatId>,
    pub poisoned_target: Option<SeatId>,
}

/// Plurality over `votes`. On a tie the candidate that first reached the
/// winning count keeps the lead.
pub fn plurality(votes: &[SeatId]) -> Option<SeatId> {
    let mut counts: HashMap<SeatId, usize> = HashMap::new();
    let mut leader: Option<(SeatId, usize)> = None;
    for &seat in votes {
        let count = counts.entry(seat).or_insert(0);
        *count += 1;
        if leader.map_or(true, |(_, best)| *count > best) {
            leader = Some((seat, *count));
        }
    }
    leader.map(|(seat, _)| seat)
}

/// Run the wolf and witch sub-phases and store the outcome on the match.
pub async fn resolve_night(table: &mut Table<'_>) -> MatchResult<NightOutcome> {
    let mut outcome = NightOutcome {
        kill_target: wolves(table).await?,
        ..NightOutcome::default()
    };
    witch(table, &mut outcome).await?;

    let round = table.state.round;
    table.state.chronicle.set_night_summary(
        round,
        vec![
            format!("Wolf kill target: {}", seat_or(outcome.kill_target, "undetermined")),
            format!("Witch heal: {}", seat_or(outcome.healed_target, "unused")),
            format!("Witch poison: {}", seat_or(outcome.poisoned_target, "unused")),
        ],
    );

    info!(
        round,
        kill = ?outcome.kill_target,
        healed = ?outcome.healed_target,
        poisoned = ?outcome.poisoned_target,
        "Night resolved"
    );
    table.state.night = Some(outcome);
    Ok(outcome)
}

async fn wolves(table: &mut Table<'_>) -> MatchResult<Option<SeatId>> {
    let round = table.state.round;
    let alive_targets = table.state.roster.alive_seats();
    let mut votes = Vec::new();

    for wolf in table.state.roster.wolves_alive() {
        if table.probe(wolf).await? {
            debug!(round, seat = wolf, "Wolf skipped the night");
            continue;
        }
        table
            .brief(wolf, Briefing::new("NIGHT_WOLVES", alive_targets.clone(), Pace::Short))
            .await?;

        let allies = table.state.roster.player(wolf)?.private.allies().to_vec();
        let meta = Metadata::new()
            .with("alive_targets", &alive_targets)
            .with("allies", allies);
        let Some(reply) = table.interact(wolf, Stage::NightWolves, meta).await? else {
            continue;
        };

        if let Some(target) = directive::parse_target(&reply, Keyword::Kill) {
            if alive_targets.contains(&target) {
                votes.push(target);
                table
                    .state
                    .chronicle
                    .log_night_event(round, NightEvent::WolfVote { from: wolf, target });
            } else {
                warn!(round, seat = wolf, target, "Wolf named a seat that is not alive, ignored");
            }
        }
        if let Some(target) = directive::parse_target(&reply, Keyword::Backup) {
            table
                .state
                .chronicle
                .log_night_event(round, NightEvent::WolfBackup { from: wolf, target });
        }
    }

    let kill = plurality(&votes);
    if let Some(target) = kill {
        table
            .state
            .chronicle
            .log_night_event(round, NightEvent::Kill { target });
    }
    Ok(kill)
}

async fn witch(table: &mut Table<'_>, outcome: &mut NightOutcome) -> MatchResult<()> {
    let round = table.state.round;
    let Some(seat) = table.state.roster.seat_with_role(Role::Witch) else {
        return Ok(());
    };
    if !table.state.roster.is_alive(seat) {
        return Ok(());
    }
    if table.probe(seat).await? {
        debug!(round, seat, "Witch skipped the night");
        return Ok(());
    }

    let alive_targets = table.state.roster.alive_seats();
    table
        .brief(seat, Briefing::new("NIGHT_WITCH", alive_targets.clone(), Pace::Short))
        .await?;

    let Some(potions) = table.state.roster.player(seat)?.private.potions() else {
        return Err(witch_without_potions(seat));
    };
    let meta = Metadata::new()
        .with("killed_list", outcome.kill_target.into_iter().collect::<Vec<_>>())
        .with("heal_left", potions.heal_left)
        .with("poison_left", potions.poison_left)
        .with("alive_map", table.state.roster.alive_map())
        .with("alive_targets", &alive_targets);
    let reply = table
        .interact(seat, Stage::NightWitch, meta)
        .await?
        .unwrap_or_default();

    let heal = directive::parse_target(&reply, Keyword::Heal);
    let poison = directive::parse_target(&reply, Keyword::Poison);
    let witch = table.state.roster.player_mut(seat)?;
    let Some(charges) = witch.private.potions_mut() else {
        return Err(witch_without_potions(seat));
    };

    let event = match (heal, poison) {
        (Some(target), _) if charges.consume_heal() => {
            if outcome.kill_target != Some(target) {
                warn!(round, seat, target, "Witch healed a seat that was not attacked");
            }
            outcome.healed_target = Some(target);
            NightEvent::WitchHeal { target }
        }
        (_, Some(target)) if charges.consume_poison() => {
            outcome.poisoned_target = Some(target);
            NightEvent::WitchPoison { target }
        }
        _ => NightEvent::WitchIdle,
    };
    table.state.chronicle.log_night_event(round, event);
    Ok(())
}

fn witch_without_potions(seat: SeatId) -> MatchError {
    MatchError::Invariant(format!("witch seat {seat} has no potion state"))
}

fn seat_or(seat: Option<SeatId>, fallback: &str) -> String {
    seat.map_or_else(|| fallback.to_string(), |s| format!("seat {s}"))
}
