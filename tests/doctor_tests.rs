// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use rust_decimal::Decimal;
use saldo::commands::accounts::{self, AccountInput};
use saldo::commands::categories::{self, CategoryInput};
use saldo::commands::transactions::{self, Breakdown, RecordInput, TransactionRequest};
use saldo::commands::{currencies, doctor, users};
use saldo::{cli, db};
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn setup() -> (Connection, i64, i64, i64, i64) {
    let mut conn = db::open_in_memory().unwrap();
    let owner = users::get_or_create(&conn, "ann").unwrap().id;
    let eur = currencies::by_code(&conn, "EUR").unwrap();
    let account = accounts::create_account(
        &conn,
        owner,
        AccountInput {
            description: "Main".into(),
            starting_saldo: d("50"),
            date_created: "2024-01-01".into(),
            currency_id: eur.id,
            color: None,
            order: None,
        },
    )
    .unwrap()
    .id;
    let cat = |conn: &Connection, name: &str, parent: Option<i64>| {
        categories::create_category(
            conn,
            owner,
            CategoryInput {
                description: name.into(),
                is_expense: true,
                usable: true,
                parent_id: parent,
                color: None,
                order: None,
            },
        )
        .unwrap()
        .id
    };
    let food = cat(&conn, "Food", None);
    let snacks = cat(&conn, "Snacks", Some(food));
    let split = transactions::create_transaction(
        &mut conn,
        owner,
        account,
        &TransactionRequest {
            amount: d("20"),
            is_expense: true,
            date_issued: "2024-02-01T10:00".into(),
            agent: "Shop".into(),
            comment: String::new(),
            breakdown: Breakdown::Split {
                records: vec![RecordInput {
                    amount: d("20"),
                    category_id: food,
                }],
                flows: vec![],
            },
        },
    )
    .unwrap()
    .transaction
    .id;
    let direct = transactions::create_transaction(
        &mut conn,
        owner,
        account,
        &TransactionRequest {
            amount: d("5"),
            is_expense: true,
            date_issued: "2024-02-02T10:00".into(),
            agent: "Bob".into(),
            comment: String::new(),
            breakdown: Breakdown::Direct,
        },
    )
    .unwrap()
    .transaction
    .id;
    (conn, owner, split, direct, snacks)
}

fn kinds(conn: &Connection, owner: i64) -> Vec<&'static str> {
    doctor::diagnose(conn, owner)
        .unwrap()
        .into_iter()
        .map(|i| i.kind)
        .collect()
}

#[test]
fn clean_ledger_has_no_issues() {
    let (conn, owner, ..) = setup();
    assert!(doctor::diagnose(&conn, owner).unwrap().is_empty());
}

#[test]
fn spots_tampered_rows() {
    let (conn, owner, split, direct, snacks) = setup();
    conn.execute("UPDATE records SET amount='19' WHERE trans_id=?1", [split])
        .unwrap();
    conn.execute("DELETE FROM flows WHERE trans_id=?1", [direct])
        .unwrap();
    conn.execute("UPDATE transactions SET currency_id=(SELECT id FROM currencies WHERE code='USD') WHERE id=?1", [split])
        .unwrap();
    assert_eq!(
        kinds(&conn, owner),
        vec!["split_sum", "direct_shape", "currency_mismatch"]
    );

    let deep: i64 = conn
        .query_row(
            "INSERT INTO categories(description, is_expense, usable, parent_id, color, sort_order, user_id)
             VALUES ('Chips', 1, 1, ?1, '#000000', 99, ?2) RETURNING id",
            [snacks, owner],
            |r| r.get(0),
        )
        .unwrap();
    assert!(deep > 0);
    assert!(kinds(&conn, owner).contains(&"category_depth"));
}

#[test]
fn spots_negative_history() {
    let (conn, owner, ..) = setup();
    conn.execute("UPDATE accounts SET starting_saldo='10'", []).unwrap();
    let issues = doctor::diagnose(&conn, owner).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "negative_saldo");
    assert!(issues[0].detail.contains("-10"));
}

#[test]
fn other_owner_is_clean() {
    let (conn, ..) = setup();
    let eve = users::get_or_create(&conn, "eve").unwrap().id;
    conn.execute("UPDATE records SET amount='1'", []).unwrap();
    assert!(doctor::diagnose(&conn, eve).unwrap().is_empty());
}

#[test]
fn cli_doctor_runs() {
    let (conn, owner, ..) = setup();
    let m = cli::build_cli().get_matches_from(["saldo", "doctor", "--json"]);
    let (_, sub) = m.subcommand().unwrap();
    doctor::handle(&conn, owner, sub).unwrap();
}
