// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Creation, editing and removal of transactions together with their
//! category records and counter-party flows.
//!
//! Every mutation runs in a single store transaction: either the
//! transaction row and all of its records and flows change, or nothing does.

use crate::commands::{accounts, agents, balances, categories, currencies};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Account, Currency, FlowDetail, RecordDetail, Transaction, TransactionDetail,
};
use crate::utils::{check_amount, fmt_money, maybe_print_json, now, parse_datetime, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordInput {
    pub amount: Decimal,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowInput {
    pub amount: Decimal,
    pub agent: String,
    pub is_debt: bool,
}

/// How a transaction's amount is broken down.
///
/// `Direct`: the whole amount is one flow with the primary agent and no
/// category applies. `Split`: category records plus optional flows with
/// third parties.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakdown {
    Direct,
    Split {
        #[serde(default)]
        records: Vec<RecordInput>,
        #[serde(default)]
        flows: Vec<FlowInput>,
    },
}

impl Breakdown {
    /// Builds a breakdown from the flat request shape. A direct transaction
    /// carrying records or flows is rejected.
    pub fn from_parts(
        direct: bool,
        records: Vec<RecordInput>,
        flows: Vec<FlowInput>,
    ) -> LedgerResult<Self> {
        if direct {
            if !records.is_empty() || !flows.is_empty() {
                return Err(LedgerError::validation(
                    "A direct transaction can't carry records or additional flows",
                ));
            }
            return Ok(Breakdown::Direct);
        }
        Ok(Breakdown::Split { records, flows })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Breakdown::Direct)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionRequest {
    pub amount: Decimal,
    pub is_expense: bool,
    /// ISO-8601 or `DD.MM.YYYY HH:MM`.
    pub date_issued: String,
    pub agent: String,
    #[serde(default)]
    pub comment: String,
    pub breakdown: Breakdown,
}

impl TransactionRequest {
    /// The request that would reproduce `detail` unchanged.
    pub fn from_detail(detail: &TransactionDetail) -> Self {
        let t = &detail.transaction;
        let breakdown = if t.direct {
            Breakdown::Direct
        } else {
            Breakdown::Split {
                records: detail
                    .records
                    .iter()
                    .map(|r| RecordInput {
                        amount: r.amount,
                        category_id: r.category_id,
                    })
                    .collect(),
                flows: detail
                    .flows
                    .iter()
                    .map(|f| FlowInput {
                        amount: f.amount,
                        agent: f.agent.clone(),
                        is_debt: f.is_debt,
                    })
                    .collect(),
            }
        };
        Self {
            amount: t.amount,
            is_expense: t.is_expense,
            date_issued: t.date_issued.to_string(),
            agent: detail.agent.clone(),
            comment: t.comment.clone(),
            breakdown,
        }
    }
}

/// Breakdown with every agent and category resolved to ids.
enum Resolved {
    Direct {
        agent_id: i64,
        amount: Decimal,
        is_debt: bool,
    },
    Split {
        records: Vec<(i64, Decimal)>,
        flows: Vec<(i64, Decimal, bool)>,
    },
}

struct Validated {
    amount: Decimal,
    is_expense: bool,
    date_issued: chrono::NaiveDateTime,
    agent_id: i64,
    comment: String,
    parts: Resolved,
}

/// Runs the validation sequence; the first failure wins. Only agent rows
/// may be written here, and they share the caller's store transaction.
fn validate(
    conn: &Connection,
    owner: i64,
    account: &Account,
    currency: &Currency,
    previous: Option<&Transaction>,
    req: &TransactionRequest,
) -> LedgerResult<Validated> {
    check_amount(req.amount, currency, "Amount")?;

    let effect = if req.is_expense { -req.amount } else { req.amount };
    let reversal = previous.map(|p| -p.signed_amount()).unwrap_or(Decimal::ZERO);
    let saldo = balances::running_balance(conn, owner, account.id, None)?;
    if saldo + reversal + effect < Decimal::ZERO {
        tracing::warn!(account = account.id, %saldo, "rejected: negative saldo");
        return Err(LedgerError::validation(
            "Transaction results in negative account saldo!",
        ));
    }

    let date_issued = parse_datetime(&req.date_issued)?;
    if date_issued < account.date_created {
        return Err(LedgerError::validation(
            "Transaction can't have been executed before the creation of the account!",
        ));
    }
    if date_issued > now() {
        return Err(LedgerError::validation(
            "Transaction can't have been executed in the future!",
        ));
    }

    let agent = agents::get_or_create(conn, owner, &req.agent)?;

    let parts = match &req.breakdown {
        Breakdown::Direct => Resolved::Direct {
            agent_id: agent.id,
            amount: req.amount,
            is_debt: !req.is_expense,
        },
        Breakdown::Split { records, flows } => {
            resolve_split(conn, owner, currency, req, records, flows)?
        }
    };

    Ok(Validated {
        amount: req.amount,
        is_expense: req.is_expense,
        date_issued,
        agent_id: agent.id,
        comment: req.comment.trim().to_string(),
        parts,
    })
}

fn resolve_split(
    conn: &Connection,
    owner: i64,
    currency: &Currency,
    req: &TransactionRequest,
    records: &[RecordInput],
    flows: &[FlowInput],
) -> LedgerResult<Resolved> {
    if records.is_empty() && flows.is_empty() {
        return Err(LedgerError::validation(
            "At least one record or flow is required",
        ));
    }

    let mut total = Decimal::ZERO;
    let mut seen_categories = HashSet::new();
    let mut resolved_records = Vec::with_capacity(records.len());
    for rec in records {
        check_amount(rec.amount, currency, "Record amount")?;
        let cat = categories::get_category(conn, owner, rec.category_id)?;
        if !cat.usable {
            return Err(LedgerError::validation(format!(
                "Category '{}' is not usable",
                cat.description
            )));
        }
        if cat.is_expense != req.is_expense {
            return Err(LedgerError::validation(format!(
                "Category '{}' doesn't match the transaction kind",
                cat.description
            )));
        }
        if !seen_categories.insert(cat.id) {
            return Err(LedgerError::validation(format!(
                "Duplicate category '{}'",
                cat.description
            )));
        }
        total += rec.amount;
        resolved_records.push((cat.id, rec.amount));
    }

    let mut seen_agents = HashSet::new();
    let mut resolved_flows = Vec::with_capacity(flows.len());
    for flow in flows {
        check_amount(flow.amount, currency, "Flow amount")?;
        let desc = flow.agent.trim();
        if !seen_agents.insert(desc.to_string()) {
            return Err(LedgerError::validation(format!("Duplicate agent '{}'", desc)));
        }
        let agent = agents::get_or_create(conn, owner, desc)?;
        total += flow.amount;
        resolved_flows.push((agent.id, flow.amount, flow.is_debt));
    }

    if total != req.amount {
        return Err(LedgerError::validation(format!(
            "Records and flows add up to {} instead of {}",
            total, req.amount
        )));
    }
    Ok(Resolved::Split {
        records: resolved_records,
        flows: resolved_flows,
    })
}

fn insert_parts(conn: &Connection, trans_id: i64, parts: &Resolved) -> LedgerResult<()> {
    match parts {
        Resolved::Direct {
            agent_id,
            amount,
            is_debt,
        } => insert_flow(conn, trans_id, *agent_id, *amount, *is_debt),
        Resolved::Split { records, flows } => {
            for (category_id, amount) in records {
                conn.execute(
                    "INSERT INTO records(amount, category_id, trans_id) VALUES (?1, ?2, ?3)",
                    params![amount.to_string(), category_id, trans_id],
                )?;
            }
            for (agent_id, amount, is_debt) in flows {
                insert_flow(conn, trans_id, *agent_id, *amount, *is_debt)?;
            }
            Ok(())
        }
    }
}

fn insert_flow(
    conn: &Connection,
    trans_id: i64,
    agent_id: i64,
    amount: Decimal,
    is_debt: bool,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO flows(amount, is_debt, agent_id, trans_id) VALUES (?1, ?2, ?3, ?4)",
        params![amount.to_string(), is_debt, agent_id, trans_id],
    )?;
    Ok(())
}

fn delete_parts(conn: &Connection, trans_id: i64) -> LedgerResult<()> {
    conn.execute("DELETE FROM records WHERE trans_id=?1", params![trans_id])?;
    conn.execute("DELETE FROM flows WHERE trans_id=?1", params![trans_id])?;
    Ok(())
}

fn load_transaction(conn: &Connection, owner: i64, id: i64) -> LedgerResult<Transaction> {
    conn.query_row(
        &format!(
            "SELECT {} FROM transactions WHERE id=?1 AND user_id=?2",
            Transaction::COLUMNS
        ),
        params![id, owner],
        Transaction::from_row,
    )
    .optional()?
    .ok_or(LedgerError::NotFound("transaction"))
}

pub fn create_transaction(
    conn: &mut Connection,
    owner: i64,
    account_id: i64,
    req: &TransactionRequest,
) -> LedgerResult<TransactionDetail> {
    let tx = conn.transaction()?;
    let account = accounts::get_account(&tx, owner, account_id)?;
    let currency = currencies::get(&tx, account.currency_id)?;
    let v = validate(&tx, owner, &account, &currency, None, req)?;

    tx.execute(
        "INSERT INTO transactions(amount, is_expense, date_issued, comment, account_id, agent_id, currency_id, user_id, direct)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            v.amount.to_string(),
            v.is_expense,
            v.date_issued,
            v.comment,
            account.id,
            v.agent_id,
            currency.id,
            owner,
            matches!(v.parts, Resolved::Direct { .. })
        ],
    )?;
    let id = tx.last_insert_rowid();
    insert_parts(&tx, id, &v.parts)?;
    tx.commit()?;
    tracing::info!(owner, account = account.id, transaction = id, "transaction created");
    get_transaction(conn, owner, id)
}

/// Replaces the fields, records and flows of an existing transaction.
/// The owning account never changes.
pub fn edit_transaction(
    conn: &mut Connection,
    owner: i64,
    transaction_id: i64,
    req: &TransactionRequest,
) -> LedgerResult<TransactionDetail> {
    let tx = conn.transaction()?;
    let old = load_transaction(&tx, owner, transaction_id)?;
    let account = accounts::get_account(&tx, owner, old.account_id)?;
    let currency = currencies::get(&tx, account.currency_id)?;
    let v = validate(&tx, owner, &account, &currency, Some(&old), req)?;

    tx.execute(
        "UPDATE transactions SET amount=?1, is_expense=?2, date_issued=?3, comment=?4, agent_id=?5, direct=?6
         WHERE id=?7 AND user_id=?8",
        params![
            v.amount.to_string(),
            v.is_expense,
            v.date_issued,
            v.comment,
            v.agent_id,
            matches!(v.parts, Resolved::Direct { .. }),
            old.id,
            owner
        ],
    )?;

    match (&v.parts, old.direct) {
        // stayed direct: the single flow is updated in place
        (
            Resolved::Direct {
                agent_id,
                amount,
                is_debt,
            },
            true,
        ) => {
            let updated = tx.execute(
                "UPDATE flows SET amount=?1, is_debt=?2, agent_id=?3 WHERE trans_id=?4",
                params![amount.to_string(), is_debt, agent_id, old.id],
            )?;
            if updated != 1 {
                delete_parts(&tx, old.id)?;
                insert_parts(&tx, old.id, &v.parts)?;
            }
        }
        // any other shape: old records and flows give way to the new ones
        _ => {
            delete_parts(&tx, old.id)?;
            insert_parts(&tx, old.id, &v.parts)?;
        }
    }
    tx.commit()?;
    tracing::info!(owner, transaction = old.id, "transaction edited");
    get_transaction(conn, owner, old.id)
}

/// Removes a transaction with its records and flows, unless that would
/// leave the account with a negative balance.
pub fn delete_transaction(conn: &mut Connection, owner: i64, transaction_id: i64) -> LedgerResult<()> {
    let tx = conn.transaction()?;
    let old = load_transaction(&tx, owner, transaction_id)?;
    let saldo = balances::running_balance(&tx, owner, old.account_id, None)?;
    if saldo - old.signed_amount() < Decimal::ZERO {
        return Err(LedgerError::validation(
            "Removing the transaction results in negative account saldo!",
        ));
    }
    delete_parts(&tx, old.id)?;
    tx.execute("DELETE FROM transactions WHERE id=?1", params![old.id])?;
    tx.commit()?;
    tracing::info!(owner, transaction = old.id, "transaction deleted");
    Ok(())
}

pub fn get_transaction(conn: &Connection, owner: i64, id: i64) -> LedgerResult<TransactionDetail> {
    let transaction = load_transaction(conn, owner, id)?;
    let account = accounts::get_account(conn, owner, transaction.account_id)?;
    let agent = agents::get(conn, owner, transaction.agent_id)?;
    let currency = currencies::get(conn, transaction.currency_id)?;

    let mut stmt = conn.prepare_cached(
        "SELECT r.id, r.amount, r.category_id, c.description
         FROM records r JOIN categories c ON c.id=r.category_id
         WHERE r.trans_id=?1 ORDER BY c.sort_order",
    )?;
    let rows = stmt.query_map(params![id], |r| {
        Ok(RecordDetail {
            id: r.get(0)?,
            amount: crate::models::decimal_at(r, 1)?,
            category_id: r.get(2)?,
            category: r.get(3)?,
        })
    })?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }

    let mut stmt = conn.prepare_cached(
        "SELECT f.id, f.amount, f.is_debt, f.agent_id, a.description
         FROM flows f JOIN agents a ON a.id=f.agent_id
         WHERE f.trans_id=?1 ORDER BY f.id",
    )?;
    let rows = stmt.query_map(params![id], |r| {
        Ok(FlowDetail {
            id: r.get(0)?,
            amount: crate::models::decimal_at(r, 1)?,
            is_debt: r.get(2)?,
            agent_id: r.get(3)?,
            agent: r.get(4)?,
        })
    })?;
    let mut flows = Vec::new();
    for row in rows {
        flows.push(row?);
    }

    Ok(TransactionDetail {
        transaction,
        account: account.description,
        agent: agent.description,
        currency,
        records,
        flows,
    })
}

/// `CATEGORY_ID:AMOUNT`
pub fn parse_record_arg(s: &str) -> LedgerResult<RecordInput> {
    let (cat, amount) = s
        .rsplit_once(':')
        .ok_or_else(|| LedgerError::validation(format!("Invalid record '{}', expected CATEGORY_ID:AMOUNT", s)))?;
    let category_id = cat
        .trim()
        .parse::<i64>()
        .map_err(|_| LedgerError::validation(format!("Invalid category id '{}'", cat.trim())))?;
    Ok(RecordInput {
        amount: parse_decimal(amount)?,
        category_id,
    })
}

/// `AGENT:AMOUNT[:debt|:credit]`; without a suffix incoming money counts
/// as debt.
pub fn parse_flow_arg(s: &str, is_expense: bool) -> LedgerResult<FlowInput> {
    let invalid = || LedgerError::validation(format!("Invalid flow '{}', expected AGENT:AMOUNT[:debt|:credit]", s));
    let (rest, is_debt) = match s.rsplit_once(':') {
        Some((rest, "debt")) => (rest, true),
        Some((rest, "credit")) => (rest, false),
        _ => (s, !is_expense),
    };
    let (agent, amount) = rest.rsplit_once(':').ok_or_else(invalid)?;
    if agent.trim().is_empty() {
        return Err(invalid());
    }
    Ok(FlowInput {
        amount: parse_decimal(amount)?,
        agent: agent.trim().to_string(),
        is_debt,
    })
}

fn request_from_args(
    sub: &clap::ArgMatches,
    base: Option<TransactionRequest>,
) -> LedgerResult<TransactionRequest> {
    let is_expense = if sub.get_flag("income") {
        false
    } else if sub.get_flag("expense") {
        true
    } else {
        base.as_ref().map(|b| b.is_expense).unwrap_or(true)
    };
    let amount = match sub.get_one::<String>("amount") {
        Some(a) => parse_decimal(a)?,
        None => base
            .as_ref()
            .map(|b| b.amount)
            .ok_or_else(|| LedgerError::validation("--amount is required"))?,
    };
    let date_issued = sub
        .get_one::<String>("date")
        .cloned()
        .or_else(|| base.as_ref().map(|b| b.date_issued.clone()))
        .unwrap_or_else(|| now().to_string());
    let agent = sub
        .get_one::<String>("agent")
        .cloned()
        .or_else(|| base.as_ref().map(|b| b.agent.clone()))
        .ok_or_else(|| LedgerError::validation("--agent is required"))?;
    let comment = sub
        .get_one::<String>("comment")
        .cloned()
        .or_else(|| base.as_ref().map(|b| b.comment.clone()))
        .unwrap_or_default();

    let records: Vec<RecordInput> = sub
        .get_many::<String>("record")
        .into_iter()
        .flatten()
        .map(|s| parse_record_arg(s))
        .collect::<LedgerResult<_>>()?;
    let flows: Vec<FlowInput> = sub
        .get_many::<String>("flow")
        .into_iter()
        .flatten()
        .map(|s| parse_flow_arg(s, is_expense))
        .collect::<LedgerResult<_>>()?;
    let direct = sub.get_flag("direct");
    let breakdown = match base {
        Some(b) if !direct && records.is_empty() && flows.is_empty() => b.breakdown,
        _ => Breakdown::from_parts(direct, records, flows)?,
    };

    Ok(TransactionRequest {
        amount,
        is_expense,
        date_issued,
        agent,
        comment,
        breakdown,
    })
}

fn print_detail(d: &TransactionDetail) {
    let t = &d.transaction;
    let kind = if t.is_expense { "expense" } else { "income" };
    println!(
        "#{} {} {} {} on '{}' with '{}' at {}{}",
        t.id,
        kind,
        fmt_money(&t.amount, &d.currency),
        d.currency.code,
        d.account,
        d.agent,
        t.date_issued,
        if t.direct { " (direct)" } else { "" }
    );
    let mut rows: Vec<Vec<String>> = d
        .records
        .iter()
        .map(|r| vec!["record".to_string(), r.category.clone(), fmt_money(&r.amount, &d.currency)])
        .collect();
    rows.extend(d.flows.iter().map(|f| {
        vec![
            if f.is_debt { "flow (debt)" } else { "flow" }.to_string(),
            f.agent.clone(),
            fmt_money(&f.amount, &d.currency),
        ]
    }));
    if !rows.is_empty() {
        println!("{}", pretty_table(&["Item", "Category/Agent", "Amount"], rows));
    }
}

pub fn handle(conn: &mut Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let account =
                accounts::find_by_description(conn, owner, sub.get_one::<String>("account").unwrap())?;
            let req = request_from_args(sub, None)?;
            let detail = create_transaction(conn, owner, account.id, &req)?;
            print_detail(&detail);
        }
        Some(("edit", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let current = get_transaction(conn, owner, id)?;
            let req = request_from_args(sub, Some(TransactionRequest::from_detail(&current)))?;
            let detail = edit_transaction(conn, owner, id, &req)?;
            print_detail(&detail);
        }
        Some(("show", sub)) => {
            let detail = get_transaction(conn, owner, *sub.get_one::<i64>("id").unwrap())?;
            if !maybe_print_json(sub.get_flag("json"), false, &detail)? {
                print_detail(&detail);
            }
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            delete_transaction(conn, owner, id)?;
            println!("Removed transaction {}", id);
        }
        _ => {}
    }
    Ok(())
}
