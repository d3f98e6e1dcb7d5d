//! Decoders must accept exactly what the Soroban SDK produces for the
//! contract's `#[contracttype]` records.

use soroban_sdk::{testutils::Address as _, Address, Env, String as SorobanString};
use sorosub_client::{
    scval::FromScVal,
    types::{Subscription, UserDebt},
};
use sorosub_interface as contract;
use stellar_xdr::curr::{ScAddress, ScVal};

const ACCOUNT: &str = "GDFYJUIWYT63JQW4YCIMJTHOTHRE4W4OAUUO6JZB3PDGCQZBQGUAOJHX";

fn strkey(address: &Address) -> String {
    ScAddress::from(address).to_string()
}

fn account_address(env: &Env) -> Address {
    Address::from_string(&SorobanString::from_str(env, ACCOUNT))
}

#[test]
fn test_subscription_decodes_from_sdk_encoding() {
    let env = Env::default();
    let merchant = Address::generate(&env);
    let token = Address::generate(&env);
    let record = contract::Subscription {
        subscriber: account_address(&env),
        merchant: merchant.clone(),
        token: token.clone(),
        amount: 99_900_000,
        interval: 2_592_000,
        last_payment_time: 1_700_000_000,
        is_active: true,
        credit_score: 30,
    };

    let encoded = ScVal::try_from(&record).unwrap();
    let decoded = Subscription::from_scval(&encoded).unwrap();

    assert_eq!(decoded.subscriber, ACCOUNT);
    assert_eq!(decoded.merchant, strkey(&merchant));
    assert!(decoded.merchant.starts_with('C'));
    assert_eq!(decoded.token, strkey(&token));
    assert_eq!(decoded.amount, 99_900_000);
    assert_eq!(decoded.interval, 2_592_000);
    assert_eq!(decoded.last_payment_time, 1_700_000_000);
    assert!(decoded.is_active);
    assert_eq!(decoded.credit_score, 30);
}

#[test]
fn test_amount_uses_both_i128_words() {
    let env = Env::default();
    let amount = i128::from(u64::MAX) * 4 + 3;
    let record = contract::UserDebt {
        amount,
        token: Address::generate(&env),
    };

    let encoded = ScVal::try_from(&record).unwrap();
    let decoded = UserDebt::from_scval(&encoded).unwrap();
    assert_eq!(decoded.amount, amount);
}

#[test]
fn test_optional_debt() {
    let env = Env::default();
    let debt = contract::UserDebt {
        amount: 25 * contract::SCALE,
        token: Address::generate(&env),
    };

    let some = ScVal::try_from(&debt).unwrap();
    let decoded = Option::<UserDebt>::from_scval(&some).unwrap().unwrap();
    assert_eq!(decoded.amount, 250_000_000);
    assert_eq!(decoded.display_amount().to_string(), "25");

    assert_eq!(Option::<UserDebt>::from_scval(&ScVal::Void).unwrap(), None);
}

#[test]
fn test_wrong_record_shape_is_decode_error() {
    let env = Env::default();
    let debt = contract::UserDebt {
        amount: 1,
        token: Address::generate(&env),
    };
    let encoded = ScVal::try_from(&debt).unwrap();
    assert!(Subscription::from_scval(&encoded).is_err());
}
