// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{balances, currencies};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountOverview};
use crate::utils::{
    check_precision, fmt_money, maybe_print_json, now, parse_color, parse_datetime, parse_decimal,
    pretty_table,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Deserialize;

pub const DEFAULT_COLOR: &str = "#1c7ed6";

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInput {
    pub description: String,
    pub starting_saldo: Decimal,
    /// ISO-8601 or `DD.MM.YYYY[ HH:MM]`.
    pub date_created: String,
    pub currency_id: i64,
    pub color: Option<String>,
    pub order: Option<i64>,
}

/// Fetches an account of `owner`. Another owner's account is reported
/// exactly like a missing one.
pub fn get_account(conn: &Connection, owner: i64, id: i64) -> LedgerResult<Account> {
    conn.query_row(
        &format!(
            "SELECT {} FROM accounts WHERE id=?1 AND user_id=?2",
            Account::COLUMNS
        ),
        params![id, owner],
        Account::from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound("account"))
}

pub fn find_by_description(conn: &Connection, owner: i64, description: &str) -> LedgerResult<Account> {
    conn.query_row(
        &format!(
            "SELECT {} FROM accounts WHERE description=?1 AND user_id=?2",
            Account::COLUMNS
        ),
        params![description.trim(), owner],
        Account::from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound("account"))
}

pub fn create_account(conn: &Connection, owner: i64, input: AccountInput) -> LedgerResult<Account> {
    let description = input.description.trim().to_string();
    if description.is_empty() {
        return Err(LedgerError::validation("Account description must not be empty"));
    }
    let currency = currencies::get(conn, input.currency_id)?;
    if input.starting_saldo < Decimal::ZERO {
        return Err(LedgerError::validation("Starting saldo must not be negative"));
    }
    check_precision(input.starting_saldo, &currency, "Starting saldo")?;
    let date_created = parse_datetime(&input.date_created)?;
    if date_created > now() {
        return Err(LedgerError::validation(
            "Account can't have been created in the future!",
        ));
    }
    let color = match input.color.as_deref() {
        Some(c) => parse_color(c)?,
        None => DEFAULT_COLOR.to_string(),
    };
    let order = match input.order {
        Some(o) => o,
        None => conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM accounts WHERE user_id=?1",
            params![owner],
            |r| r.get(0),
        )?,
    };
    conn.execute(
        "INSERT INTO accounts(description, starting_saldo, date_created, currency_id, user_id, color, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            description,
            input.starting_saldo.to_string(),
            date_created,
            currency.id,
            owner,
            color,
            order
        ],
    )
    .map_err(|e| {
        LedgerError::from(e).or_duplicate("Account with same description or order already exists!")
    })?;
    let id = conn.last_insert_rowid();
    tracing::info!(owner, account = id, currency = %currency.code, "account created");
    Ok(Account {
        id,
        description,
        starting_saldo: input.starting_saldo,
        date_created,
        currency_id: currency.id,
        user_id: owner,
        color,
        order,
    })
}

pub fn list_accounts(conn: &Connection, owner: i64) -> LedgerResult<Vec<AccountOverview>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts WHERE user_id=?1 ORDER BY sort_order",
        Account::COLUMNS
    ))?;
    let rows = stmt.query_map(params![owner], Account::from_row)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row?);
    }
    let mut out = Vec::with_capacity(accounts.len());
    for account in accounts {
        let currency = currencies::get(conn, account.currency_id)?;
        let saldo = balances::running_balance(conn, owner, account.id, None)?;
        out.push(AccountOverview {
            account,
            currency,
            saldo,
        });
    }
    Ok(out)
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let currency = match sub.get_one::<String>("currency") {
                Some(code) => currencies::by_code(conn, code)?,
                None => currencies::default_currency(conn)?,
            };
            let date_created = sub
                .get_one::<String>("created")
                .cloned()
                .unwrap_or_else(|| now().to_string());
            let input = AccountInput {
                description: sub.get_one::<String>("name").unwrap().to_string(),
                starting_saldo: parse_decimal(sub.get_one::<String>("saldo").unwrap())?,
                date_created,
                currency_id: currency.id,
                color: sub.get_one::<String>("color").cloned(),
                order: sub.get_one::<i64>("order").copied(),
            };
            let account = create_account(conn, owner, input)?;
            println!(
                "Added account '{}' ({}, starting {})",
                account.description,
                currency.code,
                fmt_money(&account.starting_saldo, &currency)
            );
        }
        Some(("list", sub)) => {
            let items = list_accounts(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
                let data = items
                    .iter()
                    .map(|o| {
                        vec![
                            o.account.id.to_string(),
                            o.account.description.clone(),
                            o.currency.code.clone(),
                            fmt_money(&o.account.starting_saldo, &o.currency),
                            fmt_money(&o.saldo, &o.currency),
                            o.account.date_created.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Account", "CCY", "Starting", "Saldo", "Created"],
                        data
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}
