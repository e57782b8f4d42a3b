// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{accounts, currencies};
use crate::error::LedgerResult;
use crate::models::{AccountTransfer, Currency, Transaction};
use crate::utils::{fmt_money, maybe_print_json, now, parse_datetime, pretty_table};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

/// Anything that moves an account's balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    Transaction(Transaction),
    Transfer(AccountTransfer),
}

impl Change {
    pub fn date_issued(&self) -> NaiveDateTime {
        match self {
            Change::Transaction(t) => t.date_issued,
            Change::Transfer(t) => t.date_issued,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Change::Transaction(t) => t.id,
            Change::Transfer(t) => t.id,
        }
    }

    /// Signed effect of this change on `account_id`.
    pub fn effect_for(&self, account_id: i64) -> Decimal {
        match self {
            Change::Transaction(t) if t.account_id == account_id => t.signed_amount(),
            Change::Transaction(_) => Decimal::ZERO,
            Change::Transfer(t) => t.signed_amount_for(account_id),
        }
    }

    /// Replay order: issue time, then transactions before transfers, then id.
    fn sort_key(&self) -> (NaiveDateTime, u8, i64) {
        let kind = match self {
            Change::Transaction(_) => 0,
            Change::Transfer(_) => 1,
        };
        (self.date_issued(), kind, self.id())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEntry {
    /// Balance right after this change.
    pub saldo: Decimal,
    pub change: Change,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceHistory {
    pub account_id: i64,
    pub currency: Currency,
    pub balance: Decimal,
    /// Most recent first.
    pub changes: Vec<ChangeEntry>,
}

/// All changes touching `account_id`, in replay order.
pub fn load_changes(conn: &Connection, account_id: i64) -> LedgerResult<Vec<Change>> {
    let mut changes = Vec::new();

    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM transactions WHERE account_id=?1",
        Transaction::COLUMNS
    ))?;
    let rows = stmt.query_map(params![account_id], Transaction::from_row)?;
    for row in rows {
        changes.push(Change::Transaction(row?));
    }

    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM transfers WHERE src_id=?1 OR dst_id=?1",
        AccountTransfer::COLUMNS
    ))?;
    let rows = stmt.query_map(params![account_id], AccountTransfer::from_row)?;
    for row in rows {
        changes.push(Change::Transfer(row?));
    }

    changes.sort_by_key(Change::sort_key);
    Ok(changes)
}

/// Balance after each change, rounded to the currency after every step.
pub fn replay(
    starting: Decimal,
    currency: &Currency,
    account_id: i64,
    changes: &[Change],
) -> Vec<Decimal> {
    let mut saldo = currency.round(starting);
    changes
        .iter()
        .map(|c| {
            saldo = currency.round(saldo + c.effect_for(account_id));
            saldo
        })
        .collect()
}

/// Balance of the account once every change issued at or before `as_of`
/// (default: now) has been applied.
pub fn running_balance(
    conn: &Connection,
    owner: i64,
    account_id: i64,
    as_of: Option<NaiveDateTime>,
) -> LedgerResult<Decimal> {
    let account = accounts::get_account(conn, owner, account_id)?;
    let currency = currencies::get(conn, account.currency_id)?;
    let as_of = as_of.unwrap_or_else(now);
    let changes: Vec<Change> = load_changes(conn, account_id)?
        .into_iter()
        .filter(|c| c.date_issued() <= as_of)
        .collect();
    let saldos = replay(account.starting_saldo, &currency, account_id, &changes);
    Ok(saldos
        .last()
        .copied()
        .unwrap_or_else(|| currency.round(account.starting_saldo)))
}

/// Changes issued within `[start, end)` with the balance after each, most
/// recent first and cut to the `limit` newest.
pub fn history(
    conn: &Connection,
    owner: i64,
    account_id: i64,
    q: &HistoryQuery,
) -> LedgerResult<BalanceHistory> {
    let account = accounts::get_account(conn, owner, account_id)?;
    let currency = currencies::get(conn, account.currency_id)?;
    let changes = load_changes(conn, account_id)?;
    let saldos = replay(account.starting_saldo, &currency, account_id, &changes);
    let balance = saldos
        .last()
        .copied()
        .unwrap_or_else(|| currency.round(account.starting_saldo));

    let mut entries: Vec<ChangeEntry> = changes
        .into_iter()
        .zip(saldos)
        .filter(|(c, _)| {
            let d = c.date_issued();
            q.start.is_none_or(|s| s <= d) && q.end.is_none_or(|e| d < e)
        })
        .map(|(change, saldo)| ChangeEntry { saldo, change })
        .collect();
    entries.reverse();
    if let Some(limit) = q.limit {
        entries.truncate(limit);
    }
    tracing::debug!(account = account_id, entries = entries.len(), "history replayed");
    Ok(BalanceHistory {
        account_id,
        currency,
        balance,
        changes: entries,
    })
}

pub fn handle(conn: &Connection, owner: i64, sub: &clap::ArgMatches) -> Result<()> {
    let account = accounts::find_by_description(conn, owner, sub.get_one::<String>("account").unwrap())?;
    let q = HistoryQuery {
        start: sub.get_one::<String>("start").map(|s| parse_datetime(s)).transpose()?,
        end: sub.get_one::<String>("end").map(|s| parse_datetime(s)).transpose()?,
        limit: sub.get_one::<usize>("limit").copied(),
    };
    let hist = history(conn, owner, account.id, &q)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &hist)? {
        let ccy = &hist.currency;
        let rows = hist
            .changes
            .iter()
            .map(|e| {
                let effect = e.change.effect_for(account.id);
                let (kind, comment) = match &e.change {
                    Change::Transaction(t) => ("transaction", t.comment.clone()),
                    Change::Transfer(t) => ("transfer", t.comment.clone()),
                };
                vec![
                    e.change.date_issued().to_string(),
                    kind.to_string(),
                    fmt_money(&effect, ccy),
                    fmt_money(&e.saldo, ccy),
                    comment,
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Kind", "Amount", "Saldo", "Comment"], rows)
        );
        println!(
            "Balance of '{}': {} {}",
            account.description,
            fmt_money(&hist.balance, ccy),
            ccy.code
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ts(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tx(id: i64, amount: &str, is_expense: bool, at: &str) -> Change {
        Change::Transaction(Transaction {
            id,
            amount: d(amount),
            is_expense,
            date_issued: ts(at),
            comment: String::new(),
            account_id: 1,
            agent_id: 1,
            currency_id: 1,
            user_id: 1,
            direct: false,
        })
    }

    fn transfer(id: i64, src: i64, dst: i64, amount: &str, at: &str) -> Change {
        Change::Transfer(AccountTransfer {
            id,
            src_amount: d(amount),
            dst_amount: d(amount),
            src_id: src,
            dst_id: dst,
            date_issued: ts(at),
            comment: String::new(),
            user_id: 1,
        })
    }

    fn eur() -> Currency {
        Currency {
            id: 1,
            code: "EUR".into(),
            decimals: 2,
        }
    }

    #[test]
    fn replay_order_ignores_insertion_order() {
        let mut a = vec![
            tx(2, "30", true, "2024-01-03T10:00"),
            tx(1, "50", false, "2024-01-01T10:00"),
            transfer(1, 1, 2, "10", "2024-01-02T10:00"),
        ];
        let mut b = a.clone();
        b.reverse();
        a.sort_by_key(Change::sort_key);
        b.sort_by_key(Change::sort_key);
        assert_eq!(a, b);
        let saldos = replay(d("0"), &eur(), 1, &a);
        assert_eq!(saldos, vec![d("50"), d("40"), d("10")]);
    }

    #[test]
    fn ties_break_on_kind_then_id() {
        let mut v = vec![
            transfer(1, 2, 1, "5", "2024-01-01T10:00"),
            tx(9, "1", false, "2024-01-01T10:00"),
            tx(3, "1", false, "2024-01-01T10:00"),
        ];
        v.sort_by_key(Change::sort_key);
        let ids: Vec<(bool, i64)> = v
            .iter()
            .map(|c| (matches!(c, Change::Transfer(_)), c.id()))
            .collect();
        assert_eq!(ids, vec![(false, 3), (false, 9), (true, 1)]);
    }

    #[test]
    fn replay_rounds_each_step() {
        let ccy = Currency {
            id: 2,
            code: "JPY".into(),
            decimals: 0,
        };
        let changes = vec![tx(1, "0.4", false, "2024-01-01T10:00"), tx(2, "0.4", false, "2024-01-02T10:00")];
        // 0 + 0.4 -> 0, 0 + 0.4 -> 0
        assert_eq!(replay(d("0"), &ccy, 1, &changes), vec![d("0"), d("0")]);
    }

    #[test]
    fn transfer_effect_depends_on_side() {
        let t = transfer(1, 1, 2, "10", "2024-01-01T10:00");
        assert_eq!(t.effect_for(1), d("-10"));
        assert_eq!(t.effect_for(2), d("10"));
        assert_eq!(t.effect_for(3), Decimal::ZERO);
    }
}
