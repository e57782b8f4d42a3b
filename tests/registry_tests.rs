// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use rust_decimal::Decimal;
use saldo::commands::accounts::{self, AccountInput};
use saldo::commands::categories::{self, CategoryInput};
use saldo::commands::transactions::{self, Breakdown, FlowInput, TransactionRequest};
use saldo::commands::{agents, currencies, users};
use saldo::error::LedgerError;
use saldo::{cli, db};
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn setup() -> (Connection, i64) {
    let conn = db::open_in_memory().unwrap();
    let owner = users::get_or_create(&conn, "ann").unwrap().id;
    (conn, owner)
}

fn account_input(name: &str, saldo: &str, currency_id: i64) -> AccountInput {
    AccountInput {
        description: name.into(),
        starting_saldo: d(saldo),
        date_created: "2024-01-01T08:00".into(),
        currency_id,
        color: None,
        order: None,
    }
}

fn category_input(name: &str, is_expense: bool, parent_id: Option<i64>) -> CategoryInput {
    CategoryInput {
        description: name.into(),
        is_expense,
        usable: true,
        parent_id,
        color: None,
        order: None,
    }
}

#[test]
fn users_are_created_once() {
    let (conn, owner) = setup();
    assert_eq!(users::get_or_create(&conn, "ann").unwrap().id, owner);
    users::get_or_create(&conn, "bob").unwrap();
    let names: Vec<String> = users::list(&conn).unwrap().into_iter().map(|u| u.username).collect();
    assert_eq!(names, vec!["ann", "bob"]);
}

#[test]
fn currencies_are_seeded_and_validated() {
    let (conn, _) = setup();
    assert_eq!(currencies::by_code(&conn, "jpy").unwrap().decimals, 0);
    assert_eq!(currencies::by_code(&conn, "EUR").unwrap().decimals, 2);

    let btc = currencies::add(&conn, " btc ", 8).unwrap();
    assert_eq!(btc.code, "BTC");
    assert!(matches!(currencies::add(&conn, "BTC", 8), Err(LedgerError::Validation(_))));
    assert!(matches!(currencies::add(&conn, "XX", 2), Err(LedgerError::Validation(_))));
    assert!(matches!(currencies::add(&conn, "XYZ", 9), Err(LedgerError::Validation(_))));
    assert!(matches!(currencies::get(&conn, 999), Err(LedgerError::NotFound("currency"))));
    assert_eq!(currencies::default_currency(&conn).unwrap().code, "EUR");

    let m = cli::build_cli().get_matches_from(["saldo", "currency", "set-default", "usd"]);
    let (_, sub) = m.subcommand().unwrap();
    currencies::handle(&conn, sub).unwrap();
    assert_eq!(currencies::default_currency(&conn).unwrap().code, "USD");
}

#[test]
fn account_rules() {
    let (conn, owner) = setup();
    let eur = currencies::by_code(&conn, "EUR").unwrap().id;
    let a = accounts::create_account(&conn, owner, account_input("  Checking ", "100.50", eur)).unwrap();
    assert_eq!(a.description, "Checking");
    assert_eq!(a.color, accounts::DEFAULT_COLOR);
    assert_eq!(a.order, 1);
    let b = accounts::create_account(&conn, owner, account_input("Savings", "0", eur)).unwrap();
    assert_eq!(b.order, 2);

    let dup = accounts::create_account(&conn, owner, account_input("Checking", "1", eur)).unwrap_err();
    assert!(matches!(dup, LedgerError::Validation(ref m) if m.contains("already exists")));

    for bad in [
        account_input("", "1", eur),
        account_input("Neg", "-1", eur),
        account_input("Precise", "1.001", eur),
        AccountInput {
            date_created: "2999-01-01".into(),
            ..account_input("Future", "1", eur)
        },
        AccountInput {
            color: Some("blue".into()),
            ..account_input("Blue", "1", eur)
        },
    ] {
        let name = bad.description.clone();
        let err = accounts::create_account(&conn, owner, bad).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)), "{}", name);
    }
    assert!(matches!(
        accounts::create_account(&conn, owner, account_input("Ghost", "1", 999)),
        Err(LedgerError::NotFound("currency"))
    ));

    // same description is fine for another owner
    let eve = users::get_or_create(&conn, "eve").unwrap().id;
    accounts::create_account(&conn, eve, account_input("Checking", "1", eur)).unwrap();
    assert!(matches!(
        accounts::get_account(&conn, eve, a.id),
        Err(LedgerError::NotFound("account"))
    ));

    let listed = accounts::list_accounts(&conn, owner).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].account.description, "Checking");
    assert_eq!(listed[0].saldo, d("100.50"));
    assert_eq!(listed[0].currency.code, "EUR");
}

#[test]
fn category_nesting() {
    let (conn, owner) = setup();
    let food = categories::create_category(&conn, owner, category_input("Food", true, None)).unwrap();
    let snacks = categories::create_category(&conn, owner, category_input("Snacks", true, Some(food.id))).unwrap();
    let rent = categories::create_category(&conn, owner, category_input("Rent", true, None)).unwrap();
    let salary = categories::create_category(&conn, owner, category_input("Salary", false, None)).unwrap();
    assert_eq!(snacks.parent_id, Some(food.id));
    assert_eq!(snacks.color, categories::DEFAULT_COLOR);

    // same name allowed on the other side
    categories::create_category(&conn, owner, category_input("Food", false, None)).unwrap();
    let dup = categories::create_category(&conn, owner, category_input("Food", true, None)).unwrap_err();
    assert!(matches!(dup, LedgerError::Validation(_)));

    let too_deep = categories::create_category(&conn, owner, category_input("Chips", true, Some(snacks.id)));
    assert!(matches!(too_deep, Err(LedgerError::Validation(_))));
    let wrong_kind = categories::create_category(&conn, owner, category_input("Bonus", false, Some(food.id)));
    assert!(matches!(wrong_kind, Err(LedgerError::Validation(_))));

    assert!(matches!(
        categories::set_parent(&conn, owner, food.id, Some(rent.id)),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        categories::set_parent(&conn, owner, salary.id, Some(rent.id)),
        Err(LedgerError::Validation(_))
    ));
    let moved = categories::set_parent(&conn, owner, rent.id, Some(food.id)).unwrap();
    assert_eq!(moved.parent_id, Some(food.id));
    let back = categories::set_parent(&conn, owner, snacks.id, None).unwrap();
    assert_eq!(back.parent_id, None);

    let eve = users::get_or_create(&conn, "eve").unwrap().id;
    assert!(matches!(
        categories::get_category(&conn, eve, food.id),
        Err(LedgerError::NotFound("category"))
    ));
    assert!(matches!(
        categories::set_parent(&conn, eve, food.id, None),
        Err(LedgerError::NotFound("category"))
    ));
}

#[test]
fn agents_get_or_create() {
    let (conn, owner) = setup();
    let a = agents::get_or_create(&conn, owner, " Bakery ").unwrap();
    let b = agents::get_or_create(&conn, owner, "Bakery").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.description, "Bakery");
    assert!(matches!(agents::get_or_create(&conn, owner, "  "), Err(LedgerError::Validation(_))));

    let eve = users::get_or_create(&conn, "eve").unwrap().id;
    let c = agents::get_or_create(&conn, eve, "Bakery").unwrap();
    assert_ne!(a.id, c.id);
    assert!(matches!(agents::get(&conn, eve, a.id), Err(LedgerError::NotFound("agent"))));
}

#[test]
fn agents_listed_by_use() {
    let (mut conn, owner) = setup();
    let eur = currencies::by_code(&conn, "EUR").unwrap().id;
    let acc = accounts::create_account(&conn, owner, account_input("Main", "100", eur)).unwrap();
    agents::get_or_create(&conn, owner, "Unused").unwrap();
    let req = |agent: &str, flows: Vec<FlowInput>| TransactionRequest {
        amount: d("10"),
        is_expense: true,
        date_issued: "2024-02-01T10:00".into(),
        agent: agent.into(),
        comment: String::new(),
        breakdown: if flows.is_empty() {
            Breakdown::Direct
        } else {
            Breakdown::Split { records: vec![], flows }
        },
    };
    transactions::create_transaction(&mut conn, owner, acc.id, &req("Shop", vec![])).unwrap();
    transactions::create_transaction(
        &mut conn,
        owner,
        acc.id,
        &req(
            "Ann",
            vec![FlowInput {
                amount: d("10"),
                agent: "Shop".into(),
                is_debt: false,
            }],
        ),
    )
    .unwrap();

    let listed: Vec<(String, i64)> = agents::list_agents(&conn, owner)
        .unwrap()
        .into_iter()
        .map(|u| (u.agent.description, u.uses))
        .collect();
    // Shop: one transaction, two flows
    assert_eq!(
        listed,
        vec![
            ("Shop".to_string(), 3),
            ("Ann".to_string(), 1),
            ("Unused".to_string(), 0)
        ]
    );
}
