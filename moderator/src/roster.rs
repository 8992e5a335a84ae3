//! Seats, roles and per-seat runtime state.
//!
//! The roster is built once from a seating plan and owns every mutable fact
//! about a seat: whether it is alive, its trust table, its notes, and its
//! role-private capabilities. Seat ids never change after setup and `alive`
//! only ever flips from `true` to `false`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};

/// Seat number, unique within a match and starting at 1.
pub type SeatId = u32;

/// Starting trust every seat holds towards every other seat.
pub const DEFAULT_TRUST: i32 = 50;

/// Closed set of roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Wolf,
    Witch,
    Hunter,
    Villager,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Self::Wolf => Faction::Wolves,
            Self::Witch | Self::Hunter | Self::Villager => Faction::Villagers,
        }
    }

    pub fn is_wolf(self) -> bool {
        self == Self::Wolf
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wolf => "wolf",
            Self::Witch => "witch",
            Self::Hunter => "hunter",
            Self::Villager => "villager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two sides of the table. Wolves are the antagonist minority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Wolves,
    Villagers,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wolves => write!(f, "wolves"),
            Self::Villagers => write!(f, "villagers"),
        }
    }
}

/// Static description of one seat, as found in a seating plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatConfig {
    pub seat_id: SeatId,
    pub role: Role,
    pub persona: String,
    pub dialect: String,
}

impl SeatConfig {
    pub fn new(
        seat_id: SeatId,
        role: Role,
        persona: impl Into<String>,
        dialect: impl Into<String>,
    ) -> Self {
        Self {
            seat_id,
            role,
            persona: persona.into(),
            dialect: dialect.into(),
        }
    }
}

/// Witch potion charges. Each starts at 1 and only decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionState {
    pub heal_left: u32,
    pub poison_left: u32,
}

impl Default for PotionState {
    fn default() -> Self {
        Self {
            heal_left: 1,
            poison_left: 1,
        }
    }
}

impl PotionState {
    /// Spend one heal charge. Returns `false` (and changes nothing) when empty.
    pub fn consume_heal(&mut self) -> bool {
        if self.heal_left == 0 {
            return false;
        }
        self.heal_left -= 1;
        true
    }

    /// Spend one poison charge. Returns `false` (and changes nothing) when empty.
    pub fn consume_poison(&mut self) -> bool {
        if self.poison_left == 0 {
            return false;
        }
        self.poison_left -= 1;
        true
    }
}

/// Role-specific private state, one variant per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RolePrivate {
    Wolf { allies: Vec<SeatId> },
    Witch { potions: PotionState },
    Hunter { has_shot: bool },
    Villager,
}

impl RolePrivate {
    /// Fellow wolves, empty for every other role.
    pub fn allies(&self) -> &[SeatId] {
        match self {
            Self::Wolf { allies } => allies,
            _ => &[],
        }
    }

    pub fn potions(&self) -> Option<PotionState> {
        match self {
            Self::Witch { potions } => Some(*potions),
            _ => None,
        }
    }

    pub fn potions_mut(&mut self) -> Option<&mut PotionState> {
        match self {
            Self::Witch { potions } => Some(potions),
            _ => None,
        }
    }

    /// True only for a hunter that has not used its shot yet.
    pub fn hunter_ready(&self) -> bool {
        matches!(self, Self::Hunter { has_shot: false })
    }

    /// Flip the hunter's single-use flag. No-op for other roles.
    pub fn mark_hunter_fired(&mut self) {
        if let Self::Hunter { has_shot } = self {
            *has_shot = true;
        }
    }
}

/// Phase label attached to a personal note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePhase {
    Night,
    Day,
}

/// One entry in a seat's private notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub round: u32,
    pub phase: NotePhase,
    pub bullets: Vec<String>,
}

/// Runtime state of one seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub seat_id: SeatId,
    pub role: Role,
    pub persona: String,
    pub dialect: String,
    alive: bool,
    pub trust: BTreeMap<SeatId, i32>,
    notes: Vec<NoteEntry>,
    pub private: RolePrivate,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_wolf(&self) -> bool {
        self.role.is_wolf()
    }

    pub fn notes(&self) -> &[NoteEntry] {
        &self.notes
    }

    /// Append a note. Notes are append-only.
    pub fn push_note(&mut self, note: NoteEntry) {
        self.notes.push(note);
    }
}

/// Alive/dead view of the whole table, ordered by seat.
pub type AliveMap = BTreeMap<SeatId, bool>;

/// The fixed set of seats for one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<SeatId, Player>,
}

impl Roster {
    /// Build a roster from a seating plan.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidSeating`] for an empty plan, a seat id of
    /// zero, duplicate seat ids, or a plan without both factions.
    pub fn from_seating(plan: &[SeatConfig]) -> MatchResult<Self> {
        if plan.is_empty() {
            return Err(MatchError::InvalidSeating("seating plan is empty".into()));
        }

        let mut seen = BTreeSet::new();
        for seat in plan {
            if seat.seat_id == 0 {
                return Err(MatchError::InvalidSeating(
                    "seat ids start at 1".into(),
                ));
            }
            if !seen.insert(seat.seat_id) {
                return Err(MatchError::InvalidSeating(format!(
                    "seat {} appears more than once",
                    seat.seat_id
                )));
            }
        }
        if !plan.iter().any(|s| s.role.is_wolf()) {
            return Err(MatchError::InvalidSeating("no wolf seat".into()));
        }
        if plan.iter().all(|s| s.role.is_wolf()) {
            return Err(MatchError::InvalidSeating("no villager-side seat".into()));
        }
        for unique in [Role::Witch, Role::Hunter] {
            if plan.iter().filter(|s| s.role == unique).count() > 1 {
                return Err(MatchError::InvalidSeating(format!(
                    "at most one {unique} seat is supported"
                )));
            }
        }

        let wolves: Vec<SeatId> = plan
            .iter()
            .filter(|s| s.role.is_wolf())
            .map(|s| s.seat_id)
            .collect();

        let players = plan
            .iter()
            .map(|seat| {
                let trust = seen
                    .iter()
                    .filter(|other| **other != seat.seat_id)
                    .map(|other| (*other, DEFAULT_TRUST))
                    .collect();
                let private = match seat.role {
                    Role::Wolf => RolePrivate::Wolf {
                        allies: wolves
                            .iter()
                            .copied()
                            .filter(|w| *w != seat.seat_id)
                            .collect(),
                    },
                    Role::Witch => RolePrivate::Witch {
                        potions: PotionState::default(),
                    },
                    Role::Hunter => RolePrivate::Hunter { has_shot: false },
                    Role::Villager => RolePrivate::Villager,
                };
                let player = Player {
                    seat_id: seat.seat_id,
                    role: seat.role,
                    persona: seat.persona.clone(),
                    dialect: seat.dialect.clone(),
                    alive: true,
                    trust,
                    notes: Vec::new(),
                    private,
                };
                (seat.seat_id, player)
            })
            .collect();

        Ok(Self { players })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, seat: SeatId) -> bool {
        self.players.contains_key(&seat)
    }

    pub fn player(&self, seat: SeatId) -> MatchResult<&Player> {
        self.players
            .get(&seat)
            .ok_or_else(|| MatchError::unknown_seat(seat))
    }

    pub fn player_mut(&mut self, seat: SeatId) -> MatchResult<&mut Player> {
        self.players
            .get_mut(&seat)
            .ok_or_else(|| MatchError::unknown_seat(seat))
    }

    /// All players in seat order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn seat_ids(&self) -> Vec<SeatId> {
        self.players.keys().copied().collect()
    }

    pub fn is_alive(&self, seat: SeatId) -> bool {
        self.players.get(&seat).is_some_and(Player::is_alive)
    }

    /// Alive seats in ascending seat order.
    pub fn alive_seats(&self) -> Vec<SeatId> {
        self.players
            .values()
            .filter(|p| p.alive)
            .map(|p| p.seat_id)
            .collect()
    }

    pub fn alive_map(&self) -> AliveMap {
        self.players
            .values()
            .map(|p| (p.seat_id, p.alive))
            .collect()
    }

    /// Alive wolves in ascending seat order.
    pub fn wolves_alive(&self) -> Vec<SeatId> {
        self.players
            .values()
            .filter(|p| p.alive && p.is_wolf())
            .map(|p| p.seat_id)
            .collect()
    }

    /// The witch seat, if the plan has one.
    pub fn seat_with_role(&self, role: Role) -> Option<SeatId> {
        self.players
            .values()
            .find(|p| p.role == role)
            .map(|p| p.seat_id)
    }

    /// `(wolves_alive, villagers_alive)` counts.
    pub fn faction_counts(&self) -> (usize, usize) {
        self.players
            .values()
            .filter(|p| p.alive)
            .fold((0, 0), |(w, v), p| match p.role.faction() {
                Faction::Wolves => (w + 1, v),
                Faction::Villagers => (w, v + 1),
            })
    }

    /// Flip a living seat to dead.
    ///
    /// # Errors
    ///
    /// Killing an unknown or already dead seat is an invariant violation:
    /// resolvers are expected to filter those out before calling.
    pub fn kill(&mut self, seat: SeatId) -> MatchResult<()> {
        let player = self.player_mut(seat)?;
        if !player.alive {
            return Err(MatchError::Invariant(format!(
                "seat {seat} is already dead"
            )));
        }
        player.alive = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::six_seat_plan;

    #[test]
    fn builds_private_state_per_role() {
        let roster = Roster::from_seating(&six_seat_plan()).unwrap();
        assert_eq!(roster.player(1).unwrap().private.allies(), &[2]);
        assert_eq!(roster.player(2).unwrap().private.allies(), &[1]);
        assert_eq!(
            roster.player(3).unwrap().private.potions(),
            Some(PotionState::default())
        );
        assert!(roster.player(4).unwrap().private.hunter_ready());
        assert_eq!(roster.player(5).unwrap().private, RolePrivate::Villager);
    }

    #[test]
    fn trust_covers_every_other_seat() {
        let roster = Roster::from_seating(&six_seat_plan()).unwrap();
        let trust = &roster.player(3).unwrap().trust;
        assert_eq!(trust.len(), 5);
        assert!(!trust.contains_key(&3));
        assert!(trust.values().all(|t| *t == DEFAULT_TRUST));
    }

    #[test]
    fn rejects_duplicate_seats() {
        let mut plan = six_seat_plan();
        plan[5].seat_id = 5;
        let err = Roster::from_seating(&plan).unwrap_err();
        assert!(matches!(err, MatchError::InvalidSeating(_)));
    }

    #[test]
    fn rejects_plan_without_wolves() {
        let plan: Vec<_> = six_seat_plan()
            .into_iter()
            .filter(|s| !s.role.is_wolf())
            .collect();
        assert!(Roster::from_seating(&plan).is_err());
    }

    #[test]
    fn rejects_seat_zero_and_empty_plan() {
        assert!(Roster::from_seating(&[]).is_err());
        let mut plan = six_seat_plan();
        plan[0].seat_id = 0;
        assert!(Roster::from_seating(&plan).is_err());
    }

    #[test]
    fn kill_is_one_directional() {
        let mut roster = Roster::from_seating(&six_seat_plan()).unwrap();
        roster.kill(5).unwrap();
        assert!(!roster.is_alive(5));
        assert!(matches!(roster.kill(5), Err(MatchError::Invariant(_))));
        assert!(matches!(roster.kill(42), Err(MatchError::Invariant(_))));
        assert_eq!(roster.alive_seats(), vec![1, 2, 3, 4, 6]);
    }

    #[test]
    fn faction_counts_track_deaths() {
        let mut roster = Roster::from_seating(&six_seat_plan()).unwrap();
        assert_eq!(roster.faction_counts(), (2, 4));
        roster.kill(1).unwrap();
        roster.kill(6).unwrap();
        assert_eq!(roster.faction_counts(), (1, 3));
        assert_eq!(roster.wolves_alive(), vec![2]);
    }

    #[test]
    fn potions_never_go_negative() {
        let mut potions = PotionState::default();
        assert!(potions.consume_heal());
        assert!(!potions.consume_heal());
        assert_eq!(potions.heal_left, 0);
        assert!(potions.consume_poison());
        assert!(!potions.consume_poison());
        assert_eq!(potions.poison_left, 0);
    }

    #[test]
    fn hunter_flag_flips_once() {
        let mut private = RolePrivate::Hunter { has_shot: false };
        private.mark_hunter_fired();
        assert!(!private.hunter_ready());
        private.mark_hunter_fired();
        assert_eq!(private, RolePrivate::Hunter { has_shot: true });

        let mut villager = RolePrivate::Villager;
        villager.mark_hunter_fired();
        assert_eq!(villager, RolePrivate::Villager);
    }
}
