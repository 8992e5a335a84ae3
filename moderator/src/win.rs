//! Termination rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roster::{Faction, Roster};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    #[default]
    Ongoing,
    VillagersWin,
    WolvesWin,
}

impl GameResult {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ongoing)
    }

    pub fn winner(self) -> Option<Faction> {
        match self {
            Self::Ongoing => None,
            Self::VillagersWin => Some(Faction::Villagers),
            Self::WolvesWin => Some(Faction::Wolves),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ongoing => write!(f, "ongoing"),
            Self::VillagersWin => write!(f, "villagers_win"),
            Self::WolvesWin => write!(f, "wolves_win"),
        }
    }
}

/// Why a match reached postgame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "faction", rename_all = "snake_case")]
pub enum FinishReason {
    Victory(Faction),
    /// The configured round cap ran out with both factions standing.
    RoundCap,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Victory(faction) => write!(f, "{faction} win"),
            Self::RoundCap => write!(f, "round cap reached"),
        }
    }
}

/// No wolves alive → villagers win; wolves at parity or better → wolves win.
///
/// Pure: reads the roster and nothing else.
pub fn evaluate(roster: &Roster) -> GameResult {
    let (wolves, villagers) = roster.faction_counts();
    if wolves == 0 {
        GameResult::VillagersWin
    } else if wolves >= villagers {
        GameResult::WolvesWin
    } else {
        GameResult::Ongoing
    }
}
