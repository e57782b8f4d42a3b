// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{get_setting, set_setting};
use crate::error::{LedgerError, LedgerResult};
use crate::models::Currency;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

pub const MAX_DECIMALS: u32 = 8;
pub const DEFAULT_CURRENCY_KEY: &str = "default_currency";

pub fn get(conn: &Connection, id: i64) -> LedgerResult<Currency> {
    conn.query_row(
        &format!("SELECT {} FROM currencies WHERE id=?1", Currency::COLUMNS),
        params![id],
        Currency::from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound("currency"))
}

pub fn by_code(conn: &Connection, code: &str) -> LedgerResult<Currency> {
    conn.query_row(
        &format!("SELECT {} FROM currencies WHERE code=?1", Currency::COLUMNS),
        params![code.trim().to_uppercase()],
        Currency::from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound("currency"))
}

pub fn add(conn: &Connection, code: &str, decimals: u32) -> LedgerResult<Currency> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::validation(format!(
            "Invalid currency code '{}', expected three letters",
            code
        )));
    }
    if decimals > MAX_DECIMALS {
        return Err(LedgerError::validation(format!(
            "Currency precision must be between 0 and {}",
            MAX_DECIMALS
        )));
    }
    conn.execute(
        "INSERT INTO currencies(code, decimals) VALUES (?1, ?2)",
        params![code, decimals],
    )
    .map_err(|e| LedgerError::from(e).or_duplicate("Currency with same code already exists!"))?;
    tracing::info!(code = %code, decimals, "currency added");
    Ok(Currency {
        id: conn.last_insert_rowid(),
        code,
        decimals,
    })
}

pub fn list(conn: &Connection) -> LedgerResult<Vec<Currency>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM currencies ORDER BY code",
        Currency::COLUMNS
    ))?;
    let rows = stmt.query_map([], Currency::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Currency used when an account is created without one.
pub fn default_currency(conn: &Connection) -> Result<Currency> {
    let code = get_setting(conn, DEFAULT_CURRENCY_KEY)?.unwrap_or_else(|| "EUR".to_string());
    Ok(by_code(conn, &code)?)
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let code = sub.get_one::<String>("code").unwrap();
            let decimals = *sub.get_one::<u32>("decimals").unwrap();
            let ccy = add(conn, code, decimals)?;
            println!("Added currency {} ({} decimals)", ccy.code, ccy.decimals);
        }
        Some(("set-default", sub)) => {
            let ccy = by_code(conn, sub.get_one::<String>("code").unwrap())?;
            set_setting(conn, DEFAULT_CURRENCY_KEY, &ccy.code)?;
            println!("Default currency set to {}", ccy.code);
        }
        Some(("list", sub)) => {
            let items = list(conn)?;
            if !maybe_print_json(sub.get_flag("json"), false, &items)? {
                let data = items
                    .into_iter()
                    .map(|c| vec![c.id.to_string(), c.code, c.decimals.to_string()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Code", "Decimals"], data));
            }
        }
        _ => {}
    }
    Ok(())
}
