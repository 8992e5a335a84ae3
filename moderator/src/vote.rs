//! Day vote: one ballot per alive seat, plurality lynch, seeded tie-break.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ability::{self, DeathCause, Shot};
use crate::agent::{Metadata, Stage};
use crate::directive::{self, Keyword};
use crate::error::MatchResult;
use crate::rng::MatchRng;
use crate::roster::SeatId;
use crate::table::{Briefing, Pace, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: SeatId,
    /// `None` only when no fallback target existed.
    pub target: Option<SeatId>,
    /// The seat's own choice was invalid and the fallback was used.
    pub overridden: bool,
}

/// One day's ballots and their result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub round: u32,
    pub ballots: Vec<Ballot>,
    pub lynched: Option<SeatId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot: Option<Shot>,
}

/// Vote counts per target, in first-seen order. Abstentions are ignored.
pub fn tally(ballots: &[Ballot]) -> Vec<(SeatId, usize)> {
    let mut counts: Vec<(SeatId, usize)> = Vec::new();
    for target in ballots.iter().filter_map(|b| b.target) {
        match counts.iter_mut().find(|(seat, _)| *seat == target) {
            Some((_, count)) => *count += 1,
            None => counts.push((target, 1)),
        }
    }
    counts
}

/// Every target sharing the top count, in first-seen order.
pub fn leaders(counts: &[(SeatId, usize)]) -> Vec<SeatId> {
    let top = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    counts
        .iter()
        .filter(|(_, c)| top > 0 && *c == top)
        .map(|(seat, _)| *seat)
        .collect()
}

/// Uniform pick among the leaders using the match's random source.
pub fn pick_lynch(ballots: &[Ballot], rng: &MatchRng) -> Option<SeatId> {
    rng.choose(&leaders(&tally(ballots)))
}

/// Collect ballots from `order`, lynch the winner and fire its reactive
/// ability. The record is also stored on the match.
pub async fn resolve_vote(table: &mut Table<'_>, order: &[SeatId]) -> MatchResult<VoteRecord> {
    let round = table.state.round;
    let alive_map = table.state.roster.alive_map();
    let mut ballots = Vec::new();

    for &seat in order {
        if !table.state.roster.is_alive(seat) {
            continue;
        }
        table.probe(seat).await?;
        table
            .brief(seat, Briefing::new("VOTE", order.to_vec(), Pace::Short))
            .await?;

        let meta = Metadata::new().with("alive_map", &alive_map);
        let reply = table.interact(seat, Stage::Vote, meta).await?;
        let choice = reply
            .as_deref()
            .and_then(|r| directive::parse_target(r, Keyword::Vote));

        let ballot = match choice {
            Some(target) if table.state.roster.is_alive(target) => Ballot {
                voter: seat,
                target: Some(target),
                overridden: false,
            },
            _ => {
                // Invalid or missing votes go to the first alive wolf.
                let fallback = table.state.roster.wolves_alive().first().copied();
                warn!(round, seat, choice = ?choice, fallback = ?fallback, "Vote overridden");
                Ballot {
                    voter: seat,
                    target: fallback,
                    overridden: true,
                }
            }
        };
        table.state.chronicle.add_vote(round, seat, ballot.target);
        ballots.push(ballot);
    }

    let lynched = pick_lynch(&ballots, table.rng);
    table.state.chronicle.set_lynch(round, lynched);

    let mut shot = None;
    match lynched {
        Some(seat) => {
            table.state.roster.kill(seat)?;
            table
                .state
                .chronicle
                .append_day_summary(round, format!("Seat {seat} was lynched"));
            table
                .state
                .chronicle
                .refresh_global_summary(format!("Day {round} lynch: seat {seat}"));
            info!(round, seat, "Lynch");
            shot = ability::trigger(table, seat, DeathCause::Lynch).await?;
        }
        None => info!(round, "No votes cast, nobody lynched"),
    }

    let record = VoteRecord {
        round,
        ballots,
        lynched,
        shot,
    };
    table.state.last_vote = Some(record.clone());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::state::MatchState;
    use crate::testing::{six_seat_plan, ScriptedAgent};

    fn ballot(voter: SeatId, target: Option<SeatId>) -> Ballot {
        Ballot {
            voter,
            target,
            overridden: false,
        }
    }

    #[test]
    fn tally_keeps_first_seen_order() {
        let ballots = [
            ballot(1, Some(5)),
            ballot(2, Some(3)),
            ballot(3, None),
            ballot(4, Some(3)),
            ballot(5, Some(5)),
        ];
        assert_eq!(tally(&ballots), vec![(5, 2), (3, 2)]);
        assert_eq!(leaders(&tally(&ballots)), vec![5, 3]);
        assert!(leaders(&[]).is_empty());
    }

    #[test]
    fn tie_break_is_reproducible_per_seed() {
        let ballots = [ballot(1, Some(2)), ballot(2, Some(4)), ballot(3, Some(6))];
        for seed in [0, 1, 42, 9001] {
            let first = pick_lynch(&ballots, &MatchRng::seeded(seed));
            for _ in 0..5 {
                assert_eq!(pick_lynch(&ballots, &MatchRng::seeded(seed)), first);
            }
            assert!(matches!(first, Some(2 | 4 | 6)));
        }
    }

    #[test]
    fn clear_winner_needs_no_luck() {
        let ballots = [ballot(1, Some(2)), ballot(2, Some(2)), ballot(3, Some(6))];
        assert_eq!(pick_lynch(&ballots, &MatchRng::seeded(7)), Some(2));
        assert_eq!(pick_lynch(&[ballot(1, None)], &MatchRng::seeded(7)), None);
    }

    #[tokio::test]
    async fn invalid_votes_fall_back_to_first_alive_wolf() {
        let mut state = MatchState::new(Roster::from_seating(&six_seat_plan()).unwrap());
        state.roster.kill(1).unwrap();
        let mut agent = ScriptedAgent::new(|call| match (call.stage, call.seat) {
            (Stage::Vote, 3) => Some("[VOTE]seat1".into()),
            (Stage::Vote, 4) => Some("[VOTE]seat99".into()),
            (Stage::Vote, 5) => Some("no idea".into()),
            (Stage::Vote, _) => Some("[VOTE]seat6".into()),
            _ => None,
        });
        let rng = MatchRng::seeded(11);
        let order = state.roster.alive_seats();
        let mut table = Table {
            state: &mut state,
            agent: &mut agent,
            prompts: None,
            rng: &rng,
        };

        let record = resolve_vote(&mut table, &order).await.unwrap();
        let targets: Vec<_> = record.ballots.iter().map(|b| (b.voter, b.target)).collect();
        assert_eq!(
            targets,
            vec![(2, Some(6)), (3, Some(2)), (4, Some(2)), (5, Some(2)), (6, Some(6))]
        );
        assert_eq!(record.lynched, Some(2));
        assert!(record.ballots[1].overridden);
        assert!(!state.roster.is_alive(2));
        assert_eq!(state.last_vote, Some(record));
        let day = &state.chronicle.round(1).unwrap().day;
        assert_eq!(day.lynch, Some(2));
        assert_eq!(day.votes.len(), 5);
        assert!(day.summary.entries().contains(&"Seat 2 was lynched".to_string()));
    }

    #[tokio::test]
    async fn lynched_hunter_takes_a_shot() {
        let mut state = MatchState::new(Roster::from_seating(&six_seat_plan()).unwrap());
        let mut agent = ScriptedAgent::new(|call| match call.stage {
            Stage::Vote => Some("[VOTE]seat4".into()),
            Stage::HunterTrigger => Some("[SHOOT]seat1".into()),
            _ => None,
        });
        let rng = MatchRng::seeded(11);
        let order = state.roster.alive_seats();
        let mut table = Table {
            state: &mut state,
            agent: &mut agent,
            prompts: None,
            rng: &rng,
        };

        let record = resolve_vote(&mut table, &order).await.unwrap();
        assert_eq!(record.lynched, Some(4));
        assert_eq!(record.shot.map(|s| (s.target, s.cause)), Some((1, DeathCause::Lynch)));
        assert_eq!(state.roster.alive_seats(), vec![2, 3, 5, 6]);
    }
}
