//! SelfPrice Merkle Vesting Contract
//!
//! Allocations are committed as a keccak256 Merkle root. Each beneficiary
//! claims its whole leaf once, after the cliff, by presenting an inclusion
//! proof.
//!
//! Leaf layout: `keccak256(beneficiary_xdr || amount as 16 big-endian bytes)`.
//! Interior nodes hash the sorted pair, smaller digest first.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, xdr::ToXdr, Address,
    Bytes, BytesN, Env, Vec,
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
    RootNotSet = 6,
    InvalidProof = 7,
    AlreadyClaimed = 8,
    Overflow = 9,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Token,
    CliffEnd,
    Root,
    Claimed(Address),
}

#[contractevent]
pub struct RootSet {
    pub root: BytesN<32>,
}

#[contractevent]
pub struct Claimed {
    #[topic]
    pub beneficiary: Address,
    pub amount: i128,
}

#[contract]
pub struct MerkleVesting;

#[contractimpl]
impl MerkleVesting {
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

    /// Commit (or replace) the allocation root. Admin only.
    pub fn set_root(env: Env, admin: Address, root: BytesN<32>) -> Result<(), Error> {
        require_admin(&env, &admin)?;
        env.storage().instance().set(&DataKey::Root, &root);
        RootSet { root }.publish(&env);
        Ok(())
    }

    pub fn root(env: Env) -> Option<BytesN<32>> {
        env.storage().instance().get(&DataKey::Root)
    }

    pub fn is_claimed(env: Env, beneficiary: Address) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Claimed(beneficiary))
    }

    /// Release the whole leaf `(beneficiary, amount)` if `proof` reaches the root.
    pub fn claim(
        env: Env,
        beneficiary: Address,
        amount: i128,
        proof: Vec<BytesN<32>>,
    ) -> Result<(), Error> {
        let cliff_end: u64 = env
            .storage()
            .instance()
            .get(&DataKey::CliffEnd)
            .ok_or(Error::NotInitialized)?;
        beneficiary.require_auth();

        if !cliff_passed(&env, cliff_end) {
            return Err(Error::CliffNotReached);
        }
        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        let root: BytesN<32> = env
            .storage()
            .instance()
            .get(&DataKey::Root)
            .ok_or(Error::RootNotSet)?;

        let claimed_key = DataKey::Claimed(beneficiary.clone());
        if env.storage().persistent().has(&claimed_key) {
            return Err(Error::AlreadyClaimed);
        }

        let leaf = leaf_hash(&env, &beneficiary, amount);
        if process_proof(&env, leaf, &proof) != root {
            return Err(Error::InvalidProof);
        }

        env.storage().persistent().set(&claimed_key, &true);
        env.storage().persistent().extend_ttl(
            &claimed_key,
            PERSISTENT_BUMP_LEDGERS,
            PERSISTENT_BUMP_LEDGERS,
        );

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

pub fn leaf_hash(env: &Env, beneficiary: &Address, amount: i128) -> BytesN<32> {
    let mut data = beneficiary.clone().to_xdr(env);
    data.extend_from_array(&amount.to_be_bytes());
    env.crypto().keccak256(&data).to_bytes()
}

pub fn hash_pair(env: &Env, a: &BytesN<32>, b: &BytesN<32>) -> BytesN<32> {
    let (lo, hi) = if a.to_array() <= b.to_array() {
        (a, b)
    } else {
        (b, a)
    };
    let mut data = Bytes::from_array(env, &lo.to_array());
    data.extend_from_array(&hi.to_array());
    env.crypto().keccak256(&data).to_bytes()
}

fn process_proof(env: &Env, leaf: BytesN<32>, proof: &Vec<BytesN<32>>) -> BytesN<32> {
    let mut node = leaf;
    for sibling in proof.iter() {
        node = hash_pair(env, &node, &sibling);
    }
    node
}
