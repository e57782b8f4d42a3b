// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{accounts, balances, currencies};
use crate::error::{LedgerError, LedgerResult};
use crate::models::AccountTransfer;
use crate::utils::{check_amount, fmt_money, maybe_print_json, now, parse_datetime, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub src_id: i64,
    pub dst_id: i64,
    pub src_amount: Decimal,
    /// Differs from `src_amount` across currencies or after fees.
    pub dst_amount: Decimal,
    pub date_issued: String,
    #[serde(default)]
    pub comment: String,
}

/// Moves money between two accounts of `owner`. Transfers can't be edited
/// once stored.
pub fn create_transfer(
    conn: &mut Connection,
    owner: i64,
    req: &TransferRequest,
) -> LedgerResult<AccountTransfer> {
    if req.src_id == req.dst_id {
        return Err(LedgerError::validation(
            "Source and destination account must differ",
        ));
    }
    let tx = conn.transaction()?;
    let src = accounts::get_account(&tx, owner, req.src_id)?;
    let dst = accounts::get_account(&tx, owner, req.dst_id)?;
    let src_ccy = currencies::get(&tx, src.currency_id)?;
    let dst_ccy = currencies::get(&tx, dst.currency_id)?;
    check_amount(req.src_amount, &src_ccy, "Source amount")?;
    check_amount(req.dst_amount, &dst_ccy, "Destination amount")?;

    let saldo = balances::running_balance(&tx, owner, src.id, None)?;
    if saldo - req.src_amount < Decimal::ZERO {
        tracing::warn!(account = src.id, %saldo, "transfer rejected: negative saldo");
        return Err(LedgerError::validation(
            "Transfer results in negative account saldo!",
        ));
    }

    let date_issued = parse_datetime(&req.date_issued)?;
    if date_issued < src.date_created || date_issued < dst.date_created {
        return Err(LedgerError::validation(
            "Transfer can't have been executed before the creation of an account!",
        ));
    }
    if date_issued > now() {
        return Err(LedgerError::validation(
            "Transfer can't have been executed in the future!",
        ));
    }

    let comment = req.comment.trim().to_string();
    tx.execute(
        "INSERT INTO transfers(src_amount, dst_amount, src_id, dst_id, date_issued, comment, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            req.src_amount.to_string(),
            req.dst_amount.to_string(),
            src.id,
            dst.id,
            date_issued,
            comment,
            owner
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    tracing::info!(owner, transfer = id, src = src.id, dst = dst.id, "transfer created");
    Ok(AccountTransfer {
        id,
        src_amount: req.src_amount,
        dst_amount: req.dst_amount,
        src_id: src.id,
        dst_id: dst.id,
        date_issued,
        comment,
        user_id: owner,
    })
}

/// Most recent first.
pub fn list_transfers(conn: &Connection, owner: i64) -> LedgerResult<Vec<AccountTransfer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transfers WHERE user_id=?1 ORDER BY date_issued DESC, id DESC",
        AccountTransfer::COLUMNS
    ))?;
    let rows = stmt.query_map(params![owner], AccountTransfer::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let src = accounts::find_by_description(conn, owner, sub.get_one::<String>("from").unwrap())?;
            let dst = accounts::find_by_description(conn, owner, sub.get_one::<String>("to").unwrap())?;
            let src_amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let dst_amount = match sub.get_one::<String>("dst-amount") {
                Some(a) => parse_decimal(a)?,
                None => src_amount,
            };
            let req = TransferRequest {
                src_id: src.id,
                dst_id: dst.id,
                src_amount,
                dst_amount,
                date_issued: sub
                    .get_one::<String>("date")
                    .cloned()
                    .unwrap_or_else(|| now().to_string()),
                comment: sub.get_one::<String>("comment").cloned().unwrap_or_default(),
            };
            let t = create_transfer(conn, owner, &req)?;
            let src_ccy = currencies::get(conn, src.currency_id)?;
            let dst_ccy = currencies::get(conn, dst.currency_id)?;
            println!(
                "Transferred {} {} from '{}' to '{}' ({} {} received)",
                fmt_money(&t.src_amount, &src_ccy),
                src_ccy.code,
                src.description,
                dst.description,
                fmt_money(&t.dst_amount, &dst_ccy),
                dst_ccy.code
            );
        }
        Some(("list", sub)) => {
            let items = list_transfers(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
                let data = items
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.to_string(),
                            t.date_issued.to_string(),
                            t.src_id.to_string(),
                            t.dst_id.to_string(),
                            t.src_amount.to_string(),
                            t.dst_amount.to_string(),
                            t.comment.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Date", "From", "To", "Sent", "Received", "Comment"], data)
                );
            }
        }
        _ => {}
    }
    Ok(())
}
