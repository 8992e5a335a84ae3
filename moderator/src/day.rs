//! Day discussion: every alive seat speaks once, in seat order, then takes
//! private notes.

use std::collections::BTreeSet;

use tracing::debug;

use crate::agent::{Metadata, Stage};
use crate::chronicle::Utterance;
use crate::directive;
use crate::error::MatchResult;
use crate::roster::{NoteEntry, NotePhase, SeatId};
use crate::table::{Briefing, Pace, Table};

/// Run the discussion and return the speaking order used.
pub async fn resolve_day_talk(table: &mut Table<'_>) -> MatchResult<Vec<SeatId>> {
    let round = table.state.round;
    let order = table.state.roster.alive_seats();
    table.state.chronicle.set_day_order(round, order.clone());

    let mut spoken = BTreeSet::new();
    for (idx, &seat) in order.iter().enumerate() {
        let turn = idx + 1;
        // By day only the alive flag gates a turn, not the probe reply.
        table.probe(seat).await?;
        if !table.state.roster.is_alive(seat) {
            continue;
        }

        table
            .brief(
                seat,
                Briefing::new("DAY_TALK", order.clone(), Pace::Moderate)
                    .turn(turn, spoken.is_empty()),
            )
            .await?;

        if !spoken.contains(&seat) {
            let player = table.state.roster.player(seat)?;
            let meta = Metadata::new()
                .with("persona", &player.persona)
                .with("dialect_hint", &player.dialect);
            table.interact(seat, Stage::Opening, meta).await?;
        }

        let meta = Metadata::new()
            .with("turn_index", turn)
            .with("total_speakers", order.len());
        let speech = table.interact(seat, Stage::DayTalk, meta).await?;
        if let Some(text) = speech.filter(|s| !s.is_empty()) {
            let one_line = directive::one_line_summary(&text);
            debug!(round, seat, summary = %one_line, "Seat spoke");
            table.state.chronicle.add_utterance(
                round,
                Utterance {
                    seat,
                    turn,
                    text,
                    one_line: one_line.clone(),
                },
            );
            table.state.chronicle.append_day_summary(round, one_line);
        }

        let meta = Metadata::new().with("round", round);
        if let Some(reply) = table.interact(seat, Stage::WriteNotes, meta).await? {
            let bullets = directive::extract_notes(&reply);
            if !bullets.is_empty() {
                table.state.roster.player_mut(seat)?.push_note(NoteEntry {
                    round,
                    phase: NotePhase::Day,
                    bullets,
                });
            }
        }
        spoken.insert(seat);
    }
    Ok(order)
}
