//! Payout computation
//!
//! A correct prediction pays `stake * multiplier` minus the house edge on
//! that gross amount. A miss forfeits the stake to the house.

use crate::common::types::Amount;
use crate::config::GameConfig;
use crate::errors::{DiceError, DiceResult};
use crate::games::types::DieFace;
use crate::BPS_DENOMINATOR;
use serde::{Deserialize, Serialize};

/// Money movements implied by one resolved game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    pub win: bool,
    /// Gross winnings before the house edge (0 on a loss)
    pub gross_payout: Amount,
    /// Fee kept by the house out of the gross payout (0 on a loss)
    pub house_fee: Amount,
    /// Amount transferred from custody to the player
    pub net_payout: Amount,
    /// Amount added to the tracked house balance
    pub house_credit: Amount,
}

/// House fee on a gross payout, rounded down
pub fn house_fee(gross: Amount, house_edge_bps: u64) -> DiceResult<Amount> {
    let fee = gross as u128 * house_edge_bps as u128 / BPS_DENOMINATOR as u128;
    Amount::try_from(fee).map_err(|_| DiceError::Overflow("house fee"))
}

pub fn compute_settlement(
    config: &GameConfig,
    stake: Amount,
    prediction: DieFace,
    outcome: DieFace,
) -> DiceResult<Settlement> {
    if prediction != outcome {
        return Ok(Settlement {
            win: false,
            gross_payout: 0,
            house_fee: 0,
            net_payout: 0,
            house_credit: stake,
        });
    }

    let gross = stake
        .checked_mul(config.payout_multiplier)
        .ok_or(DiceError::Overflow("gross payout"))?;
    let fee = house_fee(gross, config.house_edge_bps)?;

    Ok(Settlement {
        win: true,
        gross_payout: gross,
        house_fee: fee,
        net_payout: gross - fee,
        house_credit: fee,
    })
}
