//! SelfPrice Signature Vesting Contract
//!
//! An off-chain signer authorizes each release by signing
//! `sha256(beneficiary_xdr || amount_be16 || nonce_be8 || network_id || contract_xdr)`
//! with its ed25519 key. Nonces are single-use per beneficiary.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, xdr::ToXdr, Address,
    Bytes, BytesN, Env,
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
    NonceUsed = 6,
    Overflow = 7,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Token,
    Signer,
    CliffEnd,
    Nonce(Address, u64),
}

#[contractevent]
pub struct SignerUpdated {
    pub signer: BytesN<32>,
}

#[contractevent]
pub struct Claimed {
    #[topic]
    pub beneficiary: Address,
    pub amount: i128,
    pub nonce: u64,
}

#[contract]
pub struct SignatureVesting;

#[contractimpl]
impl SignatureVesting {
    /// `signer`: ed25519 public key whose signatures authorize claims
    pub fn init(
        env: Env,
        admin: Address,
        token: Address,
        signer: BytesN<32>,
        cliff_duration: u64,
    ) -> Result<(), Error> {
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
        env.storage().instance().set(&DataKey::Signer, &signer);
        env.storage().instance().set(&DataKey::CliffEnd, &cliff_end);
        env.storage()
            .instance()
            .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
        Ok(())
    }

    /// Rotate the signing key. Already consumed nonces stay consumed.
    pub fn set_signer(env: Env, admin: Address, signer: BytesN<32>) -> Result<(), Error> {
        require_admin(&env, &admin)?;
        env.storage().instance().set(&DataKey::Signer, &signer);
        SignerUpdated { signer }.publish(&env);
        Ok(())
    }

    pub fn signer(env: Env) -> Result<BytesN<32>, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Signer)
            .ok_or(Error::NotInitialized)
    }

    pub fn is_nonce_used(env: Env, beneficiary: Address, nonce: u64) -> bool {
        env.storage()
            .persistent()
            .has(&DataKey::Nonce(beneficiary, nonce))
    }

    /// Digest the signer must sign to authorize this claim.
    pub fn message(env: Env, beneficiary: Address, amount: i128, nonce: u64) -> BytesN<32> {
        claim_digest(&env, &beneficiary, amount, nonce)
    }

    /// Release `amount` to `beneficiary`. A bad signature traps the invocation.
    pub fn claim(
        env: Env,
        beneficiary: Address,
        amount: i128,
        nonce: u64,
        signature: BytesN<64>,
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

        let nonce_key = DataKey::Nonce(beneficiary.clone(), nonce);
        if env.storage().persistent().has(&nonce_key) {
            return Err(Error::NonceUsed);
        }

        let signer = Self::signer(env.clone())?;
        let digest = claim_digest(&env, &beneficiary, amount, nonce);
        env.crypto().ed25519_verify(
            &signer,
            &Bytes::from_array(&env, &digest.to_array()),
            &signature,
        );

        env.storage().persistent().set(&nonce_key, &true);
        env.storage().persistent().extend_ttl(
            &nonce_key,
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
            nonce,
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

fn claim_digest(env: &Env, beneficiary: &Address, amount: i128, nonce: u64) -> BytesN<32> {
    let mut data = beneficiary.clone().to_xdr(env);
    data.extend_from_array(&amount.to_be_bytes());
    data.extend_from_array(&nonce.to_be_bytes());
    data.extend_from_array(&env.ledger().network_id().to_array());
    data.append(&env.current_contract_address().to_xdr(env));
    env.crypto().sha256(&data).to_bytes()
}
