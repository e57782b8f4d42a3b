// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use rust_decimal::Decimal;
use saldo::commands::accounts::{self, AccountInput};
use saldo::commands::analytics::{self, AnalyticsQuery, SunburstNode};
use saldo::commands::categories::{self, CategoryInput};
use saldo::commands::transactions::{self, Breakdown, RecordInput, TransactionRequest};
use saldo::commands::{currencies, users};
use saldo::error::LedgerError;
use saldo::utils::parse_datetime;
use saldo::{cli, db};
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Fixture {
    conn: Connection,
    owner: i64,
    eur: i64,
}

fn category(conn: &Connection, owner: i64, name: &str, parent: Option<i64>, color: &str) -> i64 {
    categories::create_category(
        conn,
        owner,
        CategoryInput {
            description: name.into(),
            is_expense: name != "Salary",
            usable: true,
            parent_id: parent,
            color: Some(color.into()),
            order: None,
        },
    )
    .unwrap()
    .id
}

fn spend(conn: &mut Connection, owner: i64, account: i64, cat: i64, amount: &str, agent: &str, at: &str) {
    let req = TransactionRequest {
        amount: d(amount),
        is_expense: true,
        date_issued: at.into(),
        agent: agent.into(),
        comment: String::new(),
        breakdown: Breakdown::Split {
            records: vec![RecordInput {
                amount: d(amount),
                category_id: cat,
            }],
            flows: vec![],
        },
    };
    transactions::create_transaction(conn, owner, account, &req).unwrap();
}

/// Food(Groceries, Restaurants), Rent, Misc; Salary on the income side.
fn setup() -> Fixture {
    let mut conn = db::open_in_memory().unwrap();
    let owner = users::get_or_create(&conn, "ann").unwrap().id;
    let eur = currencies::by_code(&conn, "EUR").unwrap().id;
    let usd = currencies::by_code(&conn, "USD").unwrap().id;
    let mk = |conn: &Connection, name: &str, ccy: i64| {
        accounts::create_account(
            conn,
            owner,
            AccountInput {
                description: name.into(),
                starting_saldo: d("1000"),
                date_created: "2024-01-01".into(),
                currency_id: ccy,
                color: None,
                order: None,
            },
        )
        .unwrap()
        .id
    };
    let main = mk(&conn, "Main", eur);
    let dollars = mk(&conn, "Dollars", usd);

    let food = category(&conn, owner, "Food", None, "#111111");
    let groceries = category(&conn, owner, "Groceries", Some(food), "#222222");
    let _restaurants = category(&conn, owner, "Restaurants", Some(food), "#333333");
    let rent = category(&conn, owner, "Rent", None, "#444444");
    let _misc = category(&conn, owner, "Misc", None, "#555555");
    let _salary = category(&conn, owner, "Salary", None, "#666666");

    spend(&mut conn, owner, main, groceries, "30", "Lidl", "2024-02-03T10:00");
    spend(&mut conn, owner, main, groceries, "20", "Aldi", "2024-02-10T10:00");
    spend(&mut conn, owner, main, food, "10", "Kiosk", "2024-02-11T10:00");
    spend(&mut conn, owner, main, rent, "500", "Landlord", "2024-02-01T00:00");
    // other currency
    spend(&mut conn, owner, dollars, groceries, "99", "Lidl", "2024-02-05T10:00");
    // outside the window below
    spend(&mut conn, owner, main, groceries, "7", "Lidl", "2024-03-01T00:00");
    Fixture { conn, owner, eur }
}

fn february(f: &Fixture, by_agent: bool) -> AnalyticsQuery {
    AnalyticsQuery {
        is_expense: true,
        currency_id: f.eur,
        min_date: Some(parse_datetime("2024-02-01").unwrap()),
        max_date: Some(parse_datetime("2024-03-01").unwrap()),
        by_agent,
    }
}

fn find<'a>(nodes: &'a [SunburstNode], name: &str) -> &'a SunburstNode {
    nodes.iter().find(|n| n.name == name).unwrap()
}

#[test]
fn sunburst_by_agent() {
    let f = setup();
    let sb = analytics::sunburst(&f.conn, f.owner, &february(&f, true)).unwrap();
    assert_eq!(sb.id, "sunburst");
    assert_eq!(sb.color, "#ff0000");
    let names: Vec<&str> = sb.children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Food", "Rent", "Misc"]);

    let food = find(&sb.children, "Food");
    assert_eq!(food.id, ".Food");
    assert_eq!(food.total(), d("60"));
    let groceries = find(&food.children, "Groceries");
    assert_eq!(groceries.id, ".Food.Groceries");
    let agents: Vec<(&str, Decimal)> = groceries
        .children
        .iter()
        .map(|n| (n.id.as_str(), n.value.unwrap()))
        .collect();
    assert_eq!(
        agents,
        vec![(".Food.Groceries.Aldi", d("20")), (".Food.Groceries.Lidl", d("30"))]
    );
    assert_eq!(groceries.children[0].color, "#222222");

    let restaurants = find(&food.children, "Restaurants");
    assert_eq!(restaurants.value, Some(Decimal::ZERO));
    let kiosk = find(&food.children, "Kiosk");
    assert_eq!(kiosk.id, ".Food.Kiosk");

    assert_eq!(find(&sb.children, "Misc").value, Some(Decimal::ZERO));
    assert_eq!(find(&sb.children, "Rent").total(), d("500"));
}

#[test]
fn sunburst_by_category() {
    let f = setup();
    let sb = analytics::sunburst(&f.conn, f.owner, &february(&f, false)).unwrap();
    let food = find(&sb.children, "Food");
    assert!(food.value.is_none());
    let groceries = find(&food.children, "Groceries");
    assert_eq!(groceries.value, Some(d("50")));
    assert!(groceries.children.is_empty());
    // own records next to the subcategories
    let own = food.children.last().unwrap();
    assert_eq!(own.id, ".Food.Food");
    assert_eq!(own.value, Some(d("10")));
    assert_eq!(find(&sb.children, "Rent").value, Some(d("500")));

    let json = serde_json::to_value(&sb).unwrap();
    assert!(json["children"][0].get("value").is_none());
    assert_eq!(json["children"][0]["children"][0]["value"], serde_json::json!(50.0));
}

#[test]
fn sunburst_without_window_counts_everything_in_currency() {
    let f = setup();
    let mut q = february(&f, false);
    q.min_date = None;
    q.max_date = None;
    let sb = analytics::sunburst(&f.conn, f.owner, &q).unwrap();
    let food = find(&sb.children, "Food");
    assert_eq!(find(&food.children, "Groceries").value, Some(d("57")));

    let total: Decimal = sb.children.iter().map(|n| n.total()).sum();
    let direct: Decimal = f
        .conn
        .query_row(
            "SELECT GROUP_CONCAT(r.amount) FROM records r JOIN transactions t ON t.id=r.trans_id WHERE t.currency_id=?1",
            [f.eur],
            |r| r.get::<_, String>(0),
        )
        .unwrap()
        .split(',')
        .map(d)
        .sum();
    assert_eq!(total, direct);
}

#[test]
fn income_side_is_separate() {
    let f = setup();
    let mut q = february(&f, true);
    q.is_expense = false;
    let sb = analytics::sunburst(&f.conn, f.owner, &q).unwrap();
    assert_eq!(sb.children.len(), 1);
    assert_eq!(sb.children[0].name, "Salary");
    assert_eq!(sb.children[0].value, Some(Decimal::ZERO));
    let bars = analytics::bars(&f.conn, f.owner, &q).unwrap();
    assert!(bars.data.is_empty());
    assert!(bars.keys.is_empty());
    assert_eq!(bars.total, Decimal::ZERO);
}

#[test]
fn bars_carry_every_key() {
    let f = setup();
    let chart = analytics::bars(&f.conn, f.owner, &february(&f, false)).unwrap();
    assert_eq!(chart.keys, vec!["Food", "Groceries", "Rent"]);
    assert_eq!(chart.total, d("560"));

    let groups: Vec<&str> = chart.data.iter().map(|b| b.category.as_str()).collect();
    // Misc has nothing and is left out
    assert_eq!(groups, vec!["Food", "Rent"]);
    for bar in &chart.data {
        for key in &chart.keys {
            assert!(bar.value(key).is_some(), "{} lacks {}", bar.category, key);
        }
    }
    let food = &chart.data[0];
    assert_eq!(food.value("Food"), Some(d("10")));
    assert_eq!(food.value("Groceries"), Some(d("50")));
    assert_eq!(food.value("Rent"), Some(Decimal::ZERO));
    assert_eq!(food.total(), d("60"));
    let sum: Decimal = chart.data.iter().map(|b| b.total()).sum();
    assert_eq!(sum, chart.total);

    let json = serde_json::to_value(&chart).unwrap();
    let rent = &json["data"][1];
    assert_eq!(rent["category"], "Rent");
    assert_eq!(rent["color"], "#444444");
    assert_eq!(rent["Rent"], serde_json::json!(500.0));
    assert_eq!(rent["Groceries"], serde_json::json!(0.0));
    assert_eq!(rent["Groceries_color"], "#222222");
}

#[test]
fn unknown_currency_is_not_found() {
    let f = setup();
    let mut q = february(&f, false);
    q.currency_id = 9999;
    assert!(matches!(
        analytics::bars(&f.conn, f.owner, &q),
        Err(LedgerError::NotFound("currency"))
    ));
    assert!(matches!(
        analytics::sunburst(&f.conn, f.owner, &q),
        Err(LedgerError::NotFound("currency"))
    ));
}

#[test]
fn other_owner_sees_empty_charts() {
    let f = setup();
    let eve = users::get_or_create(&f.conn, "eve").unwrap().id;
    let sb = analytics::sunburst(&f.conn, eve, &february(&f, true)).unwrap();
    assert!(sb.children.is_empty());
    assert!(analytics::bars(&f.conn, eve, &february(&f, true)).unwrap().data.is_empty());
}

#[test]
fn cli_reports_run() {
    let f = setup();
    for args in [
        vec!["saldo", "report", "sunburst", "--currency", "eur", "--by-agent"],
        vec!["saldo", "report", "bars", "--from", "2024-02-01", "--to", "2024-03-01", "--json"],
    ] {
        let m = cli::build_cli().get_matches_from(args);
        let (_, sub) = m.subcommand().unwrap();
        analytics::handle(&f.conn, f.owner, sub).unwrap();
    }
}
