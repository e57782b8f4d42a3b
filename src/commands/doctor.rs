// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::balances;
use crate::commands::categories::CategoryTree;
use crate::commands::currencies;
use crate::error::LedgerResult;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

fn issue(kind: &'static str, detail: String) -> Issue {
    Issue { kind, detail }
}

/// Integrity report over everything `owner` has stored.
pub fn diagnose(conn: &Connection, owner: i64) -> LedgerResult<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) Split transactions whose parts don't add up, direct ones without
    //    exactly one flow
    let mut stmt = conn.prepare(
        "SELECT t.id, t.amount, t.direct,
                (SELECT COUNT(*) FROM flows f WHERE f.trans_id=t.id),
                (SELECT COUNT(*) FROM records r WHERE r.trans_id=t.id)
         FROM transactions t WHERE t.user_id=?1 ORDER BY t.id",
    )?;
    let rows = stmt.query_map(params![owner], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            crate::models::decimal_at(r, 1)?,
            r.get::<_, bool>(2)?,
            r.get::<_, i64>(3)?,
            r.get::<_, i64>(4)?,
        ))
    })?;
    let mut headers = Vec::new();
    for row in rows {
        headers.push(row?);
    }
    let mut parts = conn.prepare(
        "SELECT amount FROM records WHERE trans_id=?1
         UNION ALL SELECT amount FROM flows WHERE trans_id=?1",
    )?;
    for (id, amount, direct, flows, records) in headers {
        if direct {
            if flows != 1 || records != 0 {
                issues.push(issue(
                    "direct_shape",
                    format!("transaction {} has {} flows and {} records", id, flows, records),
                ));
            }
            continue;
        }
        let amounts = parts.query_map(params![id], |r| crate::models::decimal_at(r, 0))?;
        let mut sum = Decimal::ZERO;
        for a in amounts {
            sum += a?;
        }
        if sum != amount {
            issues.push(issue(
                "split_sum",
                format!("transaction {}: parts add up to {} instead of {}", id, sum, amount),
            ));
        }
    }

    // 2) Transaction currency differing from its account's
    let mut stmt = conn.prepare(
        "SELECT t.id, a.description FROM transactions t JOIN accounts a ON a.id=t.account_id
         WHERE t.user_id=?1 AND t.currency_id != a.currency_id",
    )?;
    let rows = stmt.query_map(params![owner], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (id, account) = row?;
        issues.push(issue(
            "currency_mismatch",
            format!("transaction {} vs account '{}'", id, account),
        ));
    }

    // 3) Histories dipping below zero
    let mut stmt = conn.prepare(
        "SELECT id, description, starting_saldo, currency_id FROM accounts WHERE user_id=?1 ORDER BY sort_order",
    )?;
    let rows = stmt.query_map(params![owner], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            crate::models::decimal_at(r, 2)?,
            r.get::<_, i64>(3)?,
        ))
    })?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row?);
    }
    for (id, description, starting, currency_id) in accounts {
        let ccy = currencies::get(conn, currency_id)?;
        let changes = balances::load_changes(conn, id)?;
        let saldos = balances::replay(starting, &ccy, id, &changes);
        if let Some((change, saldo)) = changes.iter().zip(&saldos).find(|(_, s)| **s < Decimal::ZERO) {
            issues.push(issue(
                "negative_saldo",
                format!(
                    "account '{}' reaches {} at {}",
                    description,
                    saldo,
                    change.date_issued()
                ),
            ));
        }
    }

    // 4) Categories nested deeper than one level
    let tree = CategoryTree::load(conn, owner)?;
    for idx in 0..tree.len() {
        if tree.depth(idx) > 1 {
            issues.push(issue(
                "category_depth",
                format!("category '{}' is nested {} levels deep", tree.node(idx).description, tree.depth(idx)),
            ));
        }
    }

    Ok(issues)
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    let issues = diagnose(conn, owner)?;
    if maybe_print_json(m.get_flag("json"), false, &issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
