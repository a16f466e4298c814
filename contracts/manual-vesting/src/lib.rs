//! SelfPrice Manual Vesting Contract
//!
//! Holds governed tokens and releases them to an admin-populated list of
//! beneficiaries once a cliff has passed. Tokens leave only through the
//! governed token's `transfer`, so vote power follows them automatically.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env, Vec,
};

use shared::{cliff_passed, TransferClient, PERSISTENT_BUMP_LEDGERS};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    NotAuthorized = 3,
    CliffNotReached = 4,
    InvalidAmount = 5,
    LengthMismatch = 6,
    ExceedsAllocation = 7,
    Overflow = 8,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Token,
    CliffEnd,
    Allocation(Address),
}

#[contractevent]
pub struct Allocated {
    #[topic]
    pub beneficiary: Address,
    pub amount: i128,
}

#[contractevent]
pub struct Claimed {
    #[topic]
    pub beneficiary: Address,
    pub amount: i128,
}

#[contract]
pub struct ManualVesting;

#[contractimpl]
impl ManualVesting {
    /// `cliff_duration`: seconds from now until claims open
    pub fn init(env: Env, admin: Address, token: Address, cliff_duration: u64) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }
        admin.require_auth();

        let cliff_end = env
            .ledger()
            .timestamp()
            .checked_add(cliff_duration)
            .ok_or(Error::Overflow)?;

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::CliffEnd, &cliff_end);
        env.storage()
            .instance()
            .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
        Ok(())
    }

    /// Add allocations. Repeated beneficiaries accumulate.
    pub fn populate(
        env: Env,
        admin: Address,
        beneficiaries: Vec<Address>,
        amounts: Vec<i128>,
    ) -> Result<(), Error> {
        require_admin(&env, &admin)?;

        if beneficiaries.len() != amounts.len() {
            return Err(Error::LengthMismatch);
        }
        for amount in amounts.iter() {
            if amount <= 0 {
                return Err(Error::InvalidAmount);
            }
        }

        for (beneficiary, amount) in beneficiaries.iter().zip(amounts.iter()) {
            let total = get_allocation(&env, &beneficiary)
                .checked_add(amount)
                .ok_or(Error::Overflow)?;
            set_allocation(&env, &beneficiary, total);

            Allocated {
                beneficiary,
                amount,
            }
            .publish(&env);
        }
        Ok(())
    }

    pub fn claim_amount(env: Env, beneficiary: Address) -> i128 {
        get_allocation(&env, &beneficiary)
    }

    pub fn cliff_end(env: Env) -> Result<u64, Error> {
        env.storage()
            .instance()
            .get(&DataKey::CliffEnd)
            .ok_or(Error::NotInitialized)
    }

    /// Release `amount` of the caller's allocation after the cliff.
    pub fn claim(env: Env, beneficiary: Address, amount: i128) -> Result<(), Error> {
        let cliff_end = Self::cliff_end(env.clone())?;
        beneficiary.require_auth();

        if !cliff_passed(&env, cliff_end) {
            return Err(Error::CliffNotReached);
        }
        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        let allocation = get_allocation(&env, &beneficiary);
        if amount > allocation {
            return Err(Error::ExceedsAllocation);
        }

        set_allocation(&env, &beneficiary, allocation - amount);

        let token: Address = env
            .storage()
            .instance()
            .get(&DataKey::Token)
            .ok_or(Error::NotInitialized)?;
        TransferClient::new(&env, &token).transfer(
            &env.current_contract_address(),
            &beneficiary,
            &amount,
        );

        Claimed {
            beneficiary,
            amount,
        }
        .publish(&env);
        Ok(())
    }
}

fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn get_allocation(env: &Env, beneficiary: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Allocation(beneficiary.clone()))
        .unwrap_or(0)
}

fn set_allocation(env: &Env, beneficiary: &Address, amount: i128) {
    let key = DataKey::Allocation(beneficiary.clone());
    if amount == 0 {
        env.storage().persistent().remove(&key);
        return;
    }
    env.storage().persistent().set(&key, &amount);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

#[cfg(test)]
mod test;
