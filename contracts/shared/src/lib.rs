//! Shared constants and arithmetic helpers for the SelfPrice contracts.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{contractclient, contracterror, Address, Env};

/// Error codes produced by the shared arithmetic helpers.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Error {
    InvalidAmount = 1,
    InvalidFee = 2,
    Overflow = 3,
}

/// TTL extension applied to every persistent record on write.
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Divisor for whole-percent fees (fee percentages live in `[0, 100]`).
pub const PERCENT_DIVISOR: u32 = 100;

/// Constant for basis points divisor.
pub const BASIS_POINTS_DIVISOR: u32 = 10_000;

/// Transfer capability of the governed token, as used by release contracts.
#[contractclient(name = "TransferClient")]
pub trait TransferInterface {
    fn transfer(env: Env, from: Address, to: Address, amount: i128);
    fn balance(env: Env, id: Address) -> i128;
}

/// Fee cut of `amount` at `fee_percentage` percent, rounded down.
pub fn calculate_fee(amount: i128, fee_percentage: u32) -> Result<i128, Error> {
    if amount < 0 {
        return Err(Error::InvalidAmount);
    }
    if fee_percentage > PERCENT_DIVISOR {
        return Err(Error::InvalidFee);
    }
    amount
        .checked_mul(fee_percentage as i128)
        .and_then(|v| v.checked_div(PERCENT_DIVISOR as i128))
        .ok_or(Error::Overflow)
}

/// `bps` basis points of `amount`, rounded down.
pub fn basis_points_of(amount: i128, bps: u32) -> Result<i128, Error> {
    if amount < 0 {
        return Err(Error::InvalidAmount);
    }
    amount
        .checked_mul(bps as i128)
        .and_then(|v| v.checked_div(BASIS_POINTS_DIVISOR as i128))
        .ok_or(Error::Overflow)
}

/// Whether the ledger clock has reached `cliff_end`.
pub fn cliff_passed(env: &Env, cliff_end: u64) -> bool {
    env.ledger().timestamp() >= cliff_end
}
