#![cfg(test)]

use super::*;
use selfprice_governed_token::{GovernedToken, GovernedTokenClient};
use selfprice_price_vote_ledger::{PriceVoteLedger, PriceVoteLedgerClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger},
    vec, Address, Env,
};

const CLIFF: u64 = 63_072_000;

struct Setup<'a> {
    vesting: ManualVestingClient<'a>,
    token: GovernedTokenClient<'a>,
    ledger: PriceVoteLedgerClient<'a>,
    admin: Address,
    vesting_id: Address,
}

fn setup(env: &Env) -> Setup<'_> {
    let admin = Address::generate(env);
    let payment = Address::generate(env);

    let ledger_id = env.register(PriceVoteLedger, ());
    let token_id = env.register(GovernedToken, ());
    let vesting_id = env.register(ManualVesting, ());

    let ledger = PriceVoteLedgerClient::new(env, &ledger_id);
    let token = GovernedTokenClient::new(env, &token_id);
    let vesting = ManualVestingClient::new(env, &vesting_id);

    env.mock_all_auths();

    token.init(&admin, &ledger_id, &payment, &3600u64, &100_000_000i128);
    vesting.init(&admin, &token_id, &CLIFF);
    token.transfer(&admin, &vesting_id, &60_000_000);

    Setup {
        vesting,
        token,
        ledger,
        admin,
        vesting_id,
    }
}

#[test]
fn test_populate_sets_claim_amounts() {
    let env = Env::default();
    let s = setup(&env);

    let user1 = Address::generate(&env);
    let user2 = Address::generate(&env);
    s.vesting.populate(
        &s.admin,
        &vec![&env, user1.clone(), user2.clone(), user1.clone()],
        &vec![&env, 10_000_000i128, 20_000_000, 5_000_000],
    );

    assert_eq!(s.vesting.claim_amount(&user1), 15_000_000);
    assert_eq!(s.vesting.claim_amount(&user2), 20_000_000);
}

#[test]
fn test_populate_validation() {
    let env = Env::default();
    let s = setup(&env);

    let user1 = Address::generate(&env);
    let stranger = Address::generate(&env);

    assert_eq!(
        s.vesting
            .try_populate(&stranger, &vec![&env, user1.clone()], &vec![&env, 1i128]),
        Err(Ok(Error::NotAuthorized))
    );
    assert_eq!(
        s.vesting
            .try_populate(&s.admin, &vec![&env, user1.clone()], &vec![&env, 1i128, 2]),
        Err(Ok(Error::LengthMismatch))
    );
    assert_eq!(
        s.vesting
            .try_populate(&s.admin, &vec![&env, user1.clone()], &vec![&env, 0i128]),
        Err(Ok(Error::InvalidAmount))
    );
}

#[test]
fn test_claim_before_cliff_rejected() {
    let env = Env::default();
    let s = setup(&env);

    let user1 = Address::generate(&env);
    s.vesting
        .populate(&s.admin, &vec![&env, user1.clone()], &vec![&env, 10_000_000i128]);

    env.ledger().set_timestamp(CLIFF - 1);
    assert_eq!(
        s.vesting.try_claim(&user1, &10_000_000),
        Err(Ok(Error::CliffNotReached))
    );
}

#[test]
fn test_claim_after_cliff_transfers_tokens() {
    let env = Env::default();
    let s = setup(&env);

    let user1 = Address::generate(&env);
    s.vesting
        .populate(&s.admin, &vec![&env, user1.clone()], &vec![&env, 10_000_000i128]);

    env.ledger().set_timestamp(CLIFF);
    s.vesting.claim(&user1, &4_000_000);

    assert_eq!(s.token.balance(&user1), 4_000_000);
    assert_eq!(s.token.balance(&s.vesting_id), 56_000_000);
    assert_eq!(s.vesting.claim_amount(&user1), 6_000_000);

    assert_eq!(
        s.vesting.try_claim(&user1, &6_000_001),
        Err(Ok(Error::ExceedsAllocation))
    );
    s.vesting.claim(&user1, &6_000_000);
    assert_eq!(s.vesting.claim_amount(&user1), 0);
}

#[test]
fn test_claim_raises_vote_power_of_backer() {
    let env = Env::default();
    let s = setup(&env);

    let user1 = Address::generate(&env);
    s.token.transfer(&s.admin, &user1, &1_000_000);
    s.vesting
        .populate(&s.admin, &vec![&env, user1.clone()], &vec![&env, 10_000_000i128]);

    env.ledger().set_timestamp(CLIFF);
    let key = s.token.vote(&user1, &250, &None);
    s.vesting.claim(&user1, &10_000_000);

    assert_eq!(s.ledger.get_entry(&key).power, 11_000_000);
}
