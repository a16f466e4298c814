//! SelfPrice Governed Token Contract
//!
//! A token whose exchange rate is set by its own holders. Holders vote on a
//! price with their live balance as weight; when the voting window closes the
//! price with the most aggregate power becomes the rate for `buy` and `sell`.
//!
//! ## Voting Flow
//! 1. The first `vote` after a close opens a session (`Idle -> VotingOpen`)
//! 2. Other holders join with one vote each; equal prices merge in the ledger
//! 3. Once `end_time` passes the session is `Closeable`, new votes fail
//! 4. Anyone calls `end_voting`: the heaviest entry wins, lowest price on ties.
//!    The ledger moves to a fresh epoch and backing records from the closed
//!    round stop counting, so closing costs the same for any number of voters
//!
//! ## Power Synchronization
//! Every balance change (transfer, transfer_from, buy, sell, fee collection,
//! fee burn) funnels through `move_balance`, which rewrites the backed entry's
//! power so each backer contributes exactly its current balance. Selling or
//! moving tokens after voting removes their weight from the vote.
//!
//! ## Security Model
//! - Ledger mutators require this contract's auth; nobody else can edit power
//! - Balances and ledger power are final before any outbound payment is sent
//! - Opening a session needs 0.1% of supply, joining one needs 0.05%
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, Env, String, Vec,
};

use selfprice_price_vote_ledger::{Error as LedgerError, PriceEntry, PriceVoteLedgerClient};
use shared::{basis_points_of, calculate_fee, PERCENT_DIVISOR, PERSISTENT_BUMP_LEDGERS};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fee pool burn cadence in seconds (one week).
pub const BURN_INTERVAL: u64 = 604_800;

/// Share of total supply needed to open a session (0.1%).
pub const SESSION_THRESHOLD_BPS: u32 = 10;

/// Share of total supply needed to join an open session (0.05%).
pub const VOTE_THRESHOLD_BPS: u32 = 5;

pub const DECIMALS: u32 = 7;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized    = 1,
    NotInitialized        = 2,
    NotAuthorized         = 3,
    AlreadyVoted          = 4,
    VotingWindowExpired   = 5,
    VotingStillOpen       = 6,
    NoActiveSession       = 7,
    InsufficientBalance   = 8,
    InsufficientAllowance = 9,
    InvalidRecipient      = 10,
    InvalidAmount         = 11,
    InvalidPrice          = 12,
    InvalidFee            = 13,
    InvalidConfig         = 14,
    PriceNotSet           = 15,
    InsufficientReserve   = 16,
    BelowSessionThreshold = 17,
    BelowVotingThreshold  = 18,
    UnknownKey            = 19,
    Overflow              = 20,
    TooManyPrices         = 21,
}

impl From<shared::Error> for Error {
    fn from(err: shared::Error) -> Self {
        match err {
            shared::Error::InvalidAmount => Error::InvalidAmount,
            shared::Error::InvalidFee => Error::InvalidFee,
            shared::Error::Overflow => Error::Overflow,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Admin,
    Ledger,
    PaymentToken,
    VotingDuration, // seconds
    TotalSupply,
    FeePercentage,
    LastBurn,
    Session,
    Balance(Address),
    Allowance(Address, Address), // (owner, spender)
    Backing(Address),
}

/// Stored phases are `Idle` and `VotingOpen`; `Closeable` is derived from the
/// clock by `phase()`.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    Idle,
    VotingOpen,
    Closeable,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VotingSession {
    pub phase: SessionPhase,
    pub start_time: u64,
    pub end_time: u64,
    pub resolved_price: i128,
    /// Incremented each time a session opens.
    pub round: u64,
}

/// A vote's link to its ledger entry, valid only within `round`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackingRecord {
    pub round: u64,
    pub key: u64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct VotingStarted {
    pub start_time: u64,
    pub end_time: u64,
    pub initial_price: i128,
}

#[contractevent]
pub struct Voted {
    #[topic]
    pub voter: Address,
    pub price: i128,
    pub power: i128,
}

#[contractevent]
pub struct VotingEnded {
    pub close_time: u64,
    pub resolved_price: i128,
}

#[contractevent]
pub struct Transferred {
    #[topic]
    pub from: Address,
    #[topic]
    pub to: Address,
    pub amount: i128,
}

#[contractevent]
pub struct Approved {
    #[topic]
    pub from: Address,
    #[topic]
    pub spender: Address,
    pub amount: i128,
}

#[contractevent]
pub struct Bought {
    #[topic]
    pub buyer: Address,
    pub tokens: i128,
    pub value: i128,
}

#[contractevent]
pub struct Sold {
    #[topic]
    pub seller: Address,
    pub amount: i128,
    pub payout: i128,
}

#[contractevent]
pub struct FeeUpdated {
    pub percentage: u32,
}

#[contractevent]
pub struct FeesBurned {
    pub amount: i128,
    pub time: u64,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct GovernedToken;

#[contractimpl]
impl GovernedToken {
    /// Initialize the token and bind the price ledger to it.
    ///
    /// `payment_token`: asset paid in on `buy` and paid out on `sell`
    /// `voting_duration`: session length in seconds (e.g., 3600)
    /// `initial_supply`: minted to `admin`
    pub fn init(
        env: Env,
        admin: Address,
        ledger: Address,
        payment_token: Address,
        voting_duration: u64,
        initial_supply: i128,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }
        admin.require_auth();

        if voting_duration == 0 {
            return Err(Error::InvalidConfig);
        }
        if initial_supply < 0 {
            return Err(Error::InvalidAmount);
        }

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Ledger, &ledger);
        env.storage().instance().set(&DataKey::PaymentToken, &payment_token);
        env.storage().instance().set(&DataKey::VotingDuration, &voting_duration);
        env.storage().instance().set(&DataKey::TotalSupply, &0i128);
        env.storage().instance().set(&DataKey::FeePercentage, &0u32);
        env.storage()
            .instance()
            .set(&DataKey::LastBurn, &env.ledger().timestamp());
        set_session(
            &env,
            &VotingSession {
                phase: SessionPhase::Idle,
                start_time: 0,
                end_time: 0,
                resolved_price: 0,
                round: 0,
            },
        );
        env.storage()
            .instance()
            .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        PriceVoteLedgerClient::new(&env, &ledger).init(&env.current_contract_address());

        if initial_supply > 0 {
            move_balance(&env, None, Some(&admin), initial_supply)?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Voting
    // -----------------------------------------------------------------------

    /// Back `price` with the voter's whole balance.
    ///
    /// Opens a session when none is running. `hint` is a ledger key near the
    /// expected slot; a wrong or stale hint only costs a longer walk.
    /// Returns the ledger key now backed by `voter`.
    pub fn vote(env: Env, voter: Address, price: i128, hint: Option<u64>) -> Result<u64, Error> {
        require_initialized(&env)?;
        voter.require_auth();

        if price <= 0 {
            return Err(Error::InvalidPrice);
        }

        let now = env.ledger().timestamp();
        let mut session = get_session(&env);
        let opening = match session.phase {
            SessionPhase::Idle => true,
            _ => {
                if now >= session.end_time {
                    return Err(Error::VotingWindowExpired);
                }
                if get_backing(&env, &voter).is_some() {
                    return Err(Error::AlreadyVoted);
                }
                false
            }
        };

        let balance = balance_of(&env, &voter);
        if balance <= 0 {
            return Err(Error::BelowVotingThreshold);
        }
        let supply = get_total_supply(&env);
        if opening {
            if balance < basis_points_of(supply, SESSION_THRESHOLD_BPS)? {
                return Err(Error::BelowSessionThreshold);
            }
        } else if balance < basis_points_of(supply, VOTE_THRESHOLD_BPS)? {
            return Err(Error::BelowVotingThreshold);
        }

        if opening {
            let duration = get_voting_duration(&env);
            session.phase = SessionPhase::VotingOpen;
            session.round = session.round.checked_add(1).ok_or(Error::Overflow)?;
            session.start_time = now;
            session.end_time = now.checked_add(duration).ok_or(Error::Overflow)?;
            set_session(&env, &session);

            VotingStarted {
                start_time: session.start_time,
                end_time: session.end_time,
                initial_price: session.resolved_price,
            }
            .publish(&env);
        }

        let ledger = ledger_client(&env);
        let key = match ledger.try_insert(&price, &balance, &hint) {
            Ok(Ok(key)) => key,
            Err(Ok(LedgerError::LedgerFull)) => return Err(Error::TooManyPrices),
            _ => return Err(Error::InvalidPrice),
        };
        set_backing(&env, &voter, &session, key);

        let power = load_entry(&ledger, key)?.power;
        Voted {
            voter,
            price,
            power,
        }
        .publish(&env);

        Ok(key)
    }

    /// Close an expired session and record the winning price. Anyone can call.
    ///
    /// The entry with the most power wins; the ascending scan keeps the first
    /// maximum, so ties resolve to the lowest price. An empty ledger keeps the
    /// previous price.
    pub fn end_voting(env: Env) -> Result<i128, Error> {
        require_initialized(&env)?;

        let now = env.ledger().timestamp();
        let mut session = get_session(&env);
        if session.phase == SessionPhase::Idle {
            return Err(Error::NoActiveSession);
        }
        if now < session.end_time {
            return Err(Error::VotingStillOpen);
        }

        let ledger = ledger_client(&env);
        if let Some(winner) = heaviest_entry(&ledger.get_all_entries()) {
            session.resolved_price = winner.price;
        }

        ledger.clear();

        session.phase = SessionPhase::Idle;
        set_session(&env, &session);

        VotingEnded {
            close_time: now,
            resolved_price: session.resolved_price,
        }
        .publish(&env);

        Ok(session.resolved_price)
    }

    // -----------------------------------------------------------------------
    // Balances
    // -----------------------------------------------------------------------

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;
        from.require_auth();

        check_transfer(&env, &to, amount)?;
        move_balance(&env, Some(&from), Some(&to), amount)?;

        Transferred { from, to, amount }.publish(&env);
        Ok(())
    }

    pub fn approve(env: Env, from: Address, spender: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;
        from.require_auth();

        if amount < 0 {
            return Err(Error::InvalidAmount);
        }

        let key = DataKey::Allowance(from.clone(), spender.clone());
        env.storage().persistent().set(&key, &amount);
        extend_persistent_ttl(&env, &key);

        Approved {
            from,
            spender,
            amount,
        }
        .publish(&env);
        Ok(())
    }

    /// Move `amount` out of `from`'s balance on `spender`'s allowance.
    pub fn transfer_from(
        env: Env,
        spender: Address,
        from: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        spender.require_auth();

        check_transfer(&env, &to, amount)?;

        let key = DataKey::Allowance(from.clone(), spender.clone());
        let allowed = get_allowance(&env, &from, &spender);
        if allowed < amount {
            return Err(Error::InsufficientAllowance);
        }

        move_balance(&env, Some(&from), Some(&to), amount)?;

        let remaining = allowed.checked_sub(amount).ok_or(Error::Overflow)?;
        env.storage().persistent().set(&key, &remaining);
        extend_persistent_ttl(&env, &key);

        Transferred { from, to, amount }.publish(&env);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    /// Spend up to `value` of the payment token on tokens at the resolved price.
    ///
    /// Only `tokens * price` is taken; the remainder stays with the buyer.
    /// The fee cut of the minted tokens goes to the fee pool. Returns the
    /// tokens credited to `buyer`.
    pub fn buy(env: Env, buyer: Address, value: i128) -> Result<i128, Error> {
        require_initialized(&env)?;
        buyer.require_auth();

        if value <= 0 {
            return Err(Error::InvalidAmount);
        }
        let price = require_price(&env)?;

        let tokens = value.checked_div(price).ok_or(Error::Overflow)?;
        if tokens == 0 {
            return Err(Error::InvalidAmount);
        }
        let cost = tokens.checked_mul(price).ok_or(Error::Overflow)?;
        let fee = calculate_fee(tokens, get_fee_percentage(&env))?;
        let net = tokens.checked_sub(fee).ok_or(Error::Overflow)?;

        let this = env.current_contract_address();
        if net > 0 {
            move_balance(&env, None, Some(&buyer), net)?;
        }
        if fee > 0 {
            move_balance(&env, None, Some(&this), fee)?;
        }
        burn_fees_if_due(&env)?;

        TokenClient::new(&env, &get_payment_token(&env)).transfer(&buyer, &this, &cost);

        Bought {
            buyer,
            tokens: net,
            value: cost,
        }
        .publish(&env);

        Ok(net)
    }

    /// Burn `amount` tokens and pay out their value at the resolved price,
    /// minus the fee cut which stays in the reserve. Returns the payout.
    pub fn sell(env: Env, seller: Address, amount: i128) -> Result<i128, Error> {
        require_initialized(&env)?;
        seller.require_auth();

        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }
        if balance_of(&env, &seller) < amount {
            return Err(Error::InsufficientBalance);
        }
        let price = require_price(&env)?;

        let gross = amount.checked_mul(price).ok_or(Error::Overflow)?;
        let fee = calculate_fee(gross, get_fee_percentage(&env))?;
        let payout = gross.checked_sub(fee).ok_or(Error::Overflow)?;

        let this = env.current_contract_address();
        let payment = TokenClient::new(&env, &get_payment_token(&env));
        if payment.balance(&this) < payout {
            return Err(Error::InsufficientReserve);
        }

        // Balances and vote power settle before the payout leaves.
        move_balance(&env, Some(&seller), None, amount)?;
        burn_fees_if_due(&env)?;

        if payout > 0 {
            payment.transfer(&this, &seller, &payout);
        }

        Sold {
            seller,
            amount,
            payout,
        }
        .publish(&env);

        Ok(payout)
    }

    // -----------------------------------------------------------------------
    // Fees
    // -----------------------------------------------------------------------

    /// Set the buy/sell fee cut, in whole percent.
    pub fn set_fee_percentage(env: Env, admin: Address, percentage: u32) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        if percentage > PERCENT_DIVISOR {
            return Err(Error::InvalidFee);
        }
        env.storage().instance().set(&DataKey::FeePercentage, &percentage);

        FeeUpdated { percentage }.publish(&env);
        Ok(())
    }

    /// Burn the fee pool if a full interval has passed since the last burn.
    /// Returns the amount burned.
    pub fn burn_fees(env: Env) -> Result<i128, Error> {
        require_initialized(&env)?;
        burn_fees_if_due(&env)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn balance(env: Env, id: Address) -> i128 {
        balance_of(&env, &id)
    }

    pub fn allowance(env: Env, from: Address, spender: Address) -> i128 {
        get_allowance(&env, &from, &spender)
    }

    pub fn total_supply(env: Env) -> i128 {
        get_total_supply(&env)
    }

    pub fn decimals(_env: Env) -> u32 {
        DECIMALS
    }

    pub fn name(env: Env) -> String {
        String::from_str(&env, "SelfPrice")
    }

    pub fn symbol(env: Env) -> String {
        String::from_str(&env, "SELF")
    }

    /// Rate used by `buy` and `sell`; zero until the first session resolves.
    pub fn resolved_price(env: Env) -> i128 {
        get_session(&env).resolved_price
    }

    pub fn session(env: Env) -> Result<VotingSession, Error> {
        require_initialized(&env)?;
        Ok(get_session(&env))
    }

    pub fn phase(env: Env) -> SessionPhase {
        let session = get_session(&env);
        match session.phase {
            SessionPhase::Idle => SessionPhase::Idle,
            _ if env.ledger().timestamp() >= session.end_time => SessionPhase::Closeable,
            _ => SessionPhase::VotingOpen,
        }
    }

    /// Ledger key currently backed by `voter`, if any.
    pub fn backing(env: Env, voter: Address) -> Option<u64> {
        get_backing(&env, &voter)
    }

    pub fn fee_percentage(env: Env) -> u32 {
        get_fee_percentage(&env)
    }

    /// Collected fee tokens waiting for the next burn.
    pub fn fee_pool(env: Env) -> i128 {
        balance_of(&env, &env.current_contract_address())
    }

    pub fn ledger(env: Env) -> Result<Address, Error> {
        require_initialized(&env)?;
        Ok(get_ledger(&env))
    }
}

// ---------------------------------------------------------------------------
// Balance mutation
// ---------------------------------------------------------------------------

/// The only place balances change.
///
/// `None` on the `from` side mints, `None` on the `to` side burns. All checks
/// run before the first write. After the writes, every touched address that
/// backs a ledger entry gets its power resynchronized.
fn move_balance(
    env: &Env,
    from: Option<&Address>,
    to: Option<&Address>,
    amount: i128,
) -> Result<(), Error> {
    if amount < 0 {
        return Err(Error::InvalidAmount);
    }

    let debit = match from {
        Some(addr) => {
            let old = balance_of(env, addr);
            if old < amount {
                return Err(Error::InsufficientBalance);
            }
            Some((addr, old, old - amount))
        }
        None => None,
    };

    if let (Some(src), Some(dst)) = (from, to) {
        if src == dst {
            return Ok(());
        }
    }

    let credit = match to {
        Some(addr) => {
            let old = balance_of(env, addr);
            let new = old.checked_add(amount).ok_or(Error::Overflow)?;
            Some((addr, old, new))
        }
        None => None,
    };

    let supply = get_total_supply(env);
    let new_supply = match (from, to) {
        (None, Some(_)) => supply.checked_add(amount).ok_or(Error::Overflow)?,
        (Some(_), None) => supply.checked_sub(amount).ok_or(Error::Overflow)?,
        _ => supply,
    };

    for (addr, _, new) in debit.iter().chain(credit.iter()) {
        set_balance(env, addr, *new);
    }
    env.storage().instance().set(&DataKey::TotalSupply, &new_supply);

    for (addr, old, new) in debit.iter().chain(credit.iter()) {
        sync_power(env, addr, *old, *new)?;
    }

    Ok(())
}

/// Swap `voter`'s old balance for its new one inside the backed entry.
fn sync_power(env: &Env, voter: &Address, old: i128, new: i128) -> Result<(), Error> {
    let key = match get_backing(env, voter) {
        Some(key) => key,
        None => return Ok(()),
    };
    if old == new {
        return Ok(());
    }

    let ledger = ledger_client(env);
    let entry = load_entry(&ledger, key)?;
    let power = entry
        .power
        .checked_sub(old)
        .and_then(|p| p.checked_add(new))
        .ok_or(Error::Overflow)?;
    ledger.update_power(&key, &power);

    if new == 0 {
        env.storage().persistent().remove(&DataKey::Backing(voter.clone()));
    }
    Ok(())
}

fn burn_fees_if_due(env: &Env) -> Result<i128, Error> {
    let now = env.ledger().timestamp();
    let last: u64 = env.storage().instance().get(&DataKey::LastBurn).unwrap_or(0);
    if now < last.saturating_add(BURN_INTERVAL) {
        return Ok(0);
    }

    let this = env.current_contract_address();
    let pool = balance_of(env, &this);
    if pool > 0 {
        move_balance(env, Some(&this), None, pool)?;
    }
    env.storage().instance().set(&DataKey::LastBurn, &now);

    FeesBurned {
        amount: pool,
        time: now,
    }
    .publish(env);

    Ok(pool)
}

/// First entry with maximal power in ascending-price order.
fn heaviest_entry(entries: &Vec<PriceEntry>) -> Option<PriceEntry> {
    let mut best: Option<PriceEntry> = None;
    for entry in entries.iter() {
        let heavier = match &best {
            Some(current) => entry.power > current.power,
            None => true,
        };
        if heavier {
            best = Some(entry);
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    Ok(())
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

fn require_price(env: &Env) -> Result<i128, Error> {
    let price = get_session(env).resolved_price;
    if price <= 0 {
        return Err(Error::PriceNotSet);
    }
    Ok(price)
}

fn check_transfer(env: &Env, to: &Address, amount: i128) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    // The contract's own balance is the fee pool.
    if to == &env.current_contract_address() {
        return Err(Error::InvalidRecipient);
    }
    Ok(())
}

fn ledger_client(env: &Env) -> PriceVoteLedgerClient<'_> {
    PriceVoteLedgerClient::new(env, &get_ledger(env))
}

fn load_entry(ledger: &PriceVoteLedgerClient, key: u64) -> Result<PriceEntry, Error> {
    match ledger.try_get_entry(&key) {
        Ok(Ok(entry)) => Ok(entry),
        _ => Err(Error::UnknownKey),
    }
}

fn get_ledger(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Ledger)
        .expect("GovernedToken: ledger not set")
}

fn get_payment_token(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::PaymentToken)
        .expect("GovernedToken: payment token not set")
}

fn get_voting_duration(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::VotingDuration)
        .expect("GovernedToken: voting duration not set")
}

fn get_session(env: &Env) -> VotingSession {
    env.storage()
        .instance()
        .get(&DataKey::Session)
        .unwrap_or(VotingSession {
            phase: SessionPhase::Idle,
            start_time: 0,
            end_time: 0,
            resolved_price: 0,
            round: 0,
        })
}

fn set_session(env: &Env, session: &VotingSession) {
    env.storage().instance().set(&DataKey::Session, session);
}

fn get_total_supply(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::TotalSupply)
        .unwrap_or(0)
}

fn get_fee_percentage(env: &Env) -> u32 {
    env.storage()
        .instance()
        .get(&DataKey::FeePercentage)
        .unwrap_or(0)
}

fn balance_of(env: &Env, id: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Balance(id.clone()))
        .unwrap_or(0)
}

fn set_balance(env: &Env, id: &Address, amount: i128) {
    let key = DataKey::Balance(id.clone());
    env.storage().persistent().set(&key, &amount);
    extend_persistent_ttl(env, &key);
}

fn get_allowance(env: &Env, from: &Address, spender: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Allowance(from.clone(), spender.clone()))
        .unwrap_or(0)
}

/// Key backed by `voter` in the running round. Records left over from a
/// closed round read as `None`.
fn get_backing(env: &Env, voter: &Address) -> Option<u64> {
    let record: BackingRecord = env
        .storage()
        .persistent()
        .get(&DataKey::Backing(voter.clone()))?;
    let session = get_session(env);
    if session.phase == SessionPhase::Idle || record.round != session.round {
        return None;
    }
    Some(record.key)
}

fn set_backing(env: &Env, voter: &Address, session: &VotingSession, key: u64) {
    let storage_key = DataKey::Backing(voter.clone());
    let record = BackingRecord {
        round: session.round,
        key,
    };
    env.storage().persistent().set(&storage_key, &record);
    extend_persistent_ttl(env, &storage_key);
}

fn extend_persistent_ttl(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
