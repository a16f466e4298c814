//! SelfPrice Price Vote Ledger Contract
//!
//! An ascending, doubly-linked list of proposed prices, each carrying the
//! aggregate voting power behind it. Entries live in persistent storage keyed
//! by stable `u64` keys; `prev`/`next` are key references, never pointers.
//!
//! ## Ordering rules
//! - Entries are strictly ascending by `price`, no two share a price.
//! - Every live entry has `power > 0`; an entry whose power hits zero is
//!   unlinked and deleted.
//! - Keys come from a monotonically increasing counter and are never reused,
//!   not even after `clear`.
//! - At most `MAX_ENTRIES` distinct prices are live at once. Votes for a price
//!   already present always merge.
//!
//! ## Epochs
//! Entries are stored under the current epoch. `clear` bumps the epoch and
//! resets head, tail and count, so closing a session costs the same no
//! matter how many entries it had. Records from earlier epochs are never read
//! again and age out with their TTL.
//!
//! ## Hints
//! `insert` takes an optional hint key. A live hint starts the walk next to
//! the expected slot, so cost is the distance between hint and slot. A
//! missing or stale hint falls back to a walk from the head. The result is
//! identical either way.
//!
//! The ledger knows nothing about balances. It is bound to a single owner at
//! `init` (the governed token) and every mutator requires the owner's auth.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Env, Vec,
};

use shared::PERSISTENT_BUMP_LEDGERS;

/// Upper bound on live entries. Keeps a full walk, and the token's scan at
/// session close, inside one invocation's footprint.
pub const MAX_ENTRIES: u32 = 64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized     = 2,
    UnknownKey         = 3,
    InvalidPrice       = 4,
    InvalidPower       = 5,
    Overflow           = 6,
    LedgerFull         = 7,
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Owner,
    Head,
    Tail,
    NextKey,
    Count,
    Epoch,
    Entry(u64, u64), // (epoch, key)
}

/// One price proposal and the power behind it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PriceEntry {
    pub key: u64,
    pub price: i128,
    pub power: i128,
    pub prev: Option<u64>,
    pub next: Option<u64>,
}

/// Where a price belongs relative to the current chain.
enum Slot {
    Existing(PriceEntry),
    Between(Option<u64>, Option<u64>),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct EntryInserted {
    #[topic]
    pub key: u64,
    pub price: i128,
    pub power: i128,
}

#[contractevent]
pub struct PowerUpdated {
    #[topic]
    pub key: u64,
    pub power: i128,
}

#[contractevent]
pub struct EntryRemoved {
    #[topic]
    pub key: u64,
    pub price: i128,
}

#[contractevent]
pub struct LedgerCleared {
    pub removed: u32,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct PriceVoteLedger;

#[contractimpl]
impl PriceVoteLedger {
    /// Bind the ledger to the contract allowed to mutate it.
    pub fn init(env: Env, owner: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Owner) {
            return Err(Error::AlreadyInitialized);
        }
        owner.require_auth();

        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::NextKey, &1u64);
        env.storage().instance().set(&DataKey::Count, &0u32);
        env.storage().instance().set(&DataKey::Epoch, &0u64);
        env.storage()
            .instance()
            .extend_ttl(PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
        Ok(())
    }

    /// Add `power` behind `price`, creating the entry if the price is new.
    ///
    /// Returns the key of the entry now holding `price`. Repeated prices merge
    /// into the existing node.
    pub fn insert(env: Env, price: i128, power: i128, hint: Option<u64>) -> Result<u64, Error> {
        require_owner(&env)?;

        if price <= 0 {
            return Err(Error::InvalidPrice);
        }
        if power <= 0 {
            return Err(Error::InvalidPower);
        }

        let (prev, next) = match locate(&env, price, hint)? {
            Slot::Existing(mut entry) => {
                entry.power = entry.power.checked_add(power).ok_or(Error::Overflow)?;
                save_entry(&env, &entry);

                PowerUpdated {
                    key: entry.key,
                    power: entry.power,
                }
                .publish(&env);

                return Ok(entry.key);
            }
            Slot::Between(prev, next) => (prev, next),
        };

        if get_count(&env) >= MAX_ENTRIES {
            return Err(Error::LedgerFull);
        }

        let key = take_next_key(&env)?;
        let entry = PriceEntry {
            key,
            price,
            power,
            prev,
            next,
        };

        match prev {
            Some(prev_key) => {
                let mut prev_entry = load_entry(&env, prev_key)?;
                prev_entry.next = Some(key);
                save_entry(&env, &prev_entry);
            }
            None => set_link(&env, DataKey::Head, Some(key)),
        }
        match next {
            Some(next_key) => {
                let mut next_entry = load_entry(&env, next_key)?;
                next_entry.prev = Some(key);
                save_entry(&env, &next_entry);
            }
            None => set_link(&env, DataKey::Tail, Some(key)),
        }

        save_entry(&env, &entry);
        let count = get_count(&env).checked_add(1).ok_or(Error::Overflow)?;
        env.storage().instance().set(&DataKey::Count, &count);

        EntryInserted { key, price, power }.publish(&env);

        Ok(key)
    }

    /// Overwrite the power of `key`. Zero power removes the entry.
    pub fn update_power(env: Env, key: u64, new_power: i128) -> Result<(), Error> {
        require_owner(&env)?;

        if new_power < 0 {
            return Err(Error::InvalidPower);
        }

        let mut entry = load_entry(&env, key)?;
        if new_power == 0 {
            return unlink(&env, &entry);
        }

        entry.power = new_power;
        save_entry(&env, &entry);

        PowerUpdated {
            key,
            power: new_power,
        }
        .publish(&env);

        Ok(())
    }

    /// Unlink and delete `key`. Removing a dead key is an error.
    pub fn remove_entry(env: Env, key: u64) -> Result<(), Error> {
        require_owner(&env)?;
        let entry = load_entry(&env, key)?;
        unlink(&env, &entry)
    }

    /// Drop every entry by moving to a fresh epoch. The key counter keeps
    /// counting. Returns how many entries were live.
    pub fn clear(env: Env) -> Result<u32, Error> {
        require_owner(&env)?;

        let removed = get_count(&env);
        let epoch = get_epoch(&env).checked_add(1).ok_or(Error::Overflow)?;
        env.storage().instance().set(&DataKey::Epoch, &epoch);

        set_link(&env, DataKey::Head, None);
        set_link(&env, DataKey::Tail, None);
        env.storage().instance().set(&DataKey::Count, &0u32);

        LedgerCleared { removed }.publish(&env);

        Ok(removed)
    }

    pub fn get_entry(env: Env, key: u64) -> Result<PriceEntry, Error> {
        load_entry(&env, key)
    }

    /// All live entries, ascending by price.
    pub fn get_all_entries(env: Env) -> Vec<PriceEntry> {
        let mut entries = Vec::new(&env);
        let mut cursor = get_link(&env, DataKey::Head);
        while let Some(key) = cursor {
            match try_load_entry(&env, key) {
                Some(entry) => {
                    cursor = entry.next;
                    entries.push_back(entry);
                }
                None => break,
            }
        }
        entries
    }

    pub fn head(env: Env) -> Option<u64> {
        get_link(&env, DataKey::Head)
    }

    pub fn tail(env: Env) -> Option<u64> {
        get_link(&env, DataKey::Tail)
    }

    pub fn len(env: Env) -> u32 {
        get_count(&env)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_owner(env: &Env) -> Result<(), Error> {
    let owner: Address = env
        .storage()
        .instance()
        .get(&DataKey::Owner)
        .ok_or(Error::NotInitialized)?;
    owner.require_auth();
    Ok(())
}

/// Find the node holding `price`, or the neighbours it must sit between.
fn locate(env: &Env, price: i128, hint: Option<u64>) -> Result<Slot, Error> {
    let start = match hint.and_then(|key| try_load_entry(env, key)) {
        Some(entry) => entry,
        None => match get_link(env, DataKey::Head) {
            Some(head) => load_entry(env, head)?,
            None => return Ok(Slot::Between(None, None)),
        },
    };

    if start.price == price {
        return Ok(Slot::Existing(start));
    }

    let mut cursor = start;
    if cursor.price < price {
        loop {
            let next_key = match cursor.next {
                Some(key) => key,
                None => return Ok(Slot::Between(Some(cursor.key), None)),
            };
            let next = load_entry(env, next_key)?;
            if next.price == price {
                return Ok(Slot::Existing(next));
            }
            if next.price > price {
                return Ok(Slot::Between(Some(cursor.key), Some(next_key)));
            }
            cursor = next;
        }
    } else {
        loop {
            let prev_key = match cursor.prev {
                Some(key) => key,
                None => return Ok(Slot::Between(None, Some(cursor.key))),
            };
            let prev = load_entry(env, prev_key)?;
            if prev.price == price {
                return Ok(Slot::Existing(prev));
            }
            if prev.price < price {
                return Ok(Slot::Between(Some(prev_key), Some(cursor.key)));
            }
            cursor = prev;
        }
    }
}

fn unlink(env: &Env, entry: &PriceEntry) -> Result<(), Error> {
    match entry.prev {
        Some(prev_key) => {
            let mut prev = load_entry(env, prev_key)?;
            prev.next = entry.next;
            save_entry(env, &prev);
        }
        None => set_link(env, DataKey::Head, entry.next),
    }
    match entry.next {
        Some(next_key) => {
            let mut next = load_entry(env, next_key)?;
            next.prev = entry.prev;
            save_entry(env, &next);
        }
        None => set_link(env, DataKey::Tail, entry.prev),
    }

    env.storage().persistent().remove(&entry_key(env, entry.key));
    let count = get_count(env).checked_sub(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::Count, &count);

    EntryRemoved {
        key: entry.key,
        price: entry.price,
    }
    .publish(env);

    Ok(())
}

fn take_next_key(env: &Env) -> Result<u64, Error> {
    let key: u64 = env
        .storage()
        .instance()
        .get(&DataKey::NextKey)
        .ok_or(Error::NotInitialized)?;
    let following = key.checked_add(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::NextKey, &following);
    Ok(key)
}

fn entry_key(env: &Env, key: u64) -> DataKey {
    DataKey::Entry(get_epoch(env), key)
}

fn try_load_entry(env: &Env, key: u64) -> Option<PriceEntry> {
    env.storage().persistent().get(&entry_key(env, key))
}

fn load_entry(env: &Env, key: u64) -> Result<PriceEntry, Error> {
    try_load_entry(env, key).ok_or(Error::UnknownKey)
}

fn save_entry(env: &Env, entry: &PriceEntry) {
    let key = entry_key(env, entry.key);
    env.storage().persistent().set(&key, entry);
    env.storage()
        .persistent()
        .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn get_link(env: &Env, which: DataKey) -> Option<u64> {
    env.storage().instance().get(&which)
}

fn set_link(env: &Env, which: DataKey, key: Option<u64>) {
    match key {
        Some(key) => env.storage().instance().set(&which, &key),
        None => env.storage().instance().remove(&which),
    }
}

fn get_count(env: &Env) -> u32 {
    env.storage().instance().get(&DataKey::Count).unwrap_or(0)
}

fn get_epoch(env: &Env) -> u64 {
    env.storage().instance().get(&DataKey::Epoch).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
