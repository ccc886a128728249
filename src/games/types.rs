use crate::common::types::{AccountId, Amount, GameId};
use crate::errors::GameError;
use crate::DICE_FACES;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A die face in `[1, 6]`, used for both predictions and outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DieFace(u8);

impl DieFace {
    pub fn new(value: u8) -> Result<Self, GameError> {
        if (1..=DICE_FACES).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GameError::InvalidPrediction(value))
        }
    }

    /// Map an arbitrary seed onto a face: `(seed mod 6) + 1`
    pub fn from_seed(seed: u128) -> Self {
        Self((seed % DICE_FACES as u128) as u8 + 1)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = DieFace> {
        (1..=DICE_FACES).map(DieFace)
    }
}

impl TryFrom<u8> for DieFace {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DieFace> for u8 {
    fn from(face: DieFace) -> u8 {
        face.0
    }
}

impl fmt::Display for DieFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Win or loss from the player's point of view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
}

/// Which derivation produced an outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RandomnessKind {
    Public,
    Vrf,
    CommitReveal,
}

impl fmt::Display for RandomnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomnessKind::Public => write!(f, "public"),
            RandomnessKind::Vrf => write!(f, "vrf"),
            RandomnessKind::CommitReveal => write!(f, "commit_reveal"),
        }
    }
}

/// Evidence stored alongside a resolved game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollProof {
    pub kind: RandomnessKind,
    pub outcome: DieFace,
    /// Decimal seed the outcome was reduced from
    pub seed: String,
    /// Hex-encoded VRF pre-output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Hex-encoded VRF proof or seed commitment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

/// A wager record. Created at admission, resolved exactly once, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub player: AccountId,
    pub stake: Amount,
    pub prediction: DieFace,
    pub outcome: Option<DieFace>,
    pub payout: Amount,
    #[serde(default)]
    pub house_fee: Amount,
    pub admission_height: u64,
    #[serde(default)]
    pub resolution_height: Option<u64>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_proof: Option<RollProof>,
}

impl Game {
    pub fn new(id: GameId, player: AccountId, stake: Amount, prediction: DieFace, height: u64) -> Self {
        Self {
            id,
            player,
            stake,
            prediction,
            outcome: None,
            payout: 0,
            house_fee: 0,
            admission_height: height,
            resolution_height: None,
            resolved: false,
            roll_proof: None,
        }
    }

    pub fn game_outcome(&self) -> Option<GameOutcome> {
        self.outcome.map(|outcome| {
            if outcome == self.prediction {
                GameOutcome::Win
            } else {
                GameOutcome::Loss
            }
        })
    }
}

/// Per-account aggregates; every field only ever grows
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStatistics {
    pub games_count: u64,
    pub total_staked: Amount,
    pub total_won: Amount,
    pub total_lost: Amount,
    #[serde(default)]
    pub games_won: u64,
    #[serde(default)]
    pub games_lost: u64,
}

/// What `resolve_game` hands back to the caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionReceipt {
    pub game_id: GameId,
    pub outcome: DieFace,
    pub win: bool,
    pub payout: Amount,
    pub house_fee: Amount,
}

/// Static limits bundled with live counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameInfo {
    pub min_bet: Amount,
    pub max_bet: Amount,
    pub house_edge_bps: u64,
    pub payout_multiplier: u64,
    pub game_counter: u64,
    pub house_balance: Amount,
    pub custody_balance: Amount,
    pub randomness: RandomnessKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_die_face_bounds() {
        assert!(DieFace::new(0).is_err());
        assert!(DieFace::new(7).is_err());
        assert_eq!(DieFace::new(1).unwrap().value(), 1);
        assert_eq!(DieFace::new(6).unwrap().value(), 6);
        assert_eq!(DieFace::all().count(), 6);
    }

    #[test]
    fn test_die_face_from_seed() {
        assert_eq!(DieFace::from_seed(0).value(), 1);
        assert_eq!(DieFace::from_seed(5).value(), 6);
        assert_eq!(DieFace::from_seed(6).value(), 1);
        assert_eq!(DieFace::from_seed(u128::MAX).value(), (u128::MAX % 6) as u8 + 1);
    }

    #[test]
    fn test_die_face_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<DieFace>("7").is_err());
        assert_eq!(serde_json::from_str::<DieFace>("3").unwrap().value(), 3);
    }

    #[test]
    fn test_game_outcome_follows_prediction() {
        let mut game = Game::new(1, AccountId::new([1; 32]), 10, DieFace::new(3).unwrap(), 5);
        assert_eq!(game.game_outcome(), None);

        game.outcome = Some(DieFace::new(3).unwrap());
        assert_eq!(game.game_outcome(), Some(GameOutcome::Win));

        game.outcome = Some(DieFace::new(5).unwrap());
        assert_eq!(game.game_outcome(), Some(GameOutcome::Loss));
    }
}
