pub mod types;
pub mod settlement;
pub mod randomness;
pub mod events;
pub mod betting;
pub mod resolution;

pub use types::*;
pub use settlement::{compute_settlement, Settlement};
pub use randomness::{
    build_randomness, CommitRevealRandomness, PublicDeterministic, RandomnessSource, VrfRandomness,
};
pub use events::{BetPlaced, EventBus, GameEvent, GameResolved};
