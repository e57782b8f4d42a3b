// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDateTime;
use rusqlite::Row;
use rusqlite::types::Type;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reads a decimal stored as TEXT.
pub(crate) fn decimal_at(r: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    raw.trim()
        .parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub code: String,
    pub decimals: u32,
}

impl Currency {
    pub(crate) const COLUMNS: &'static str = "id, code, decimals";

    pub(crate) fn from_row(r: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            code: r.get(1)?,
            decimals: r.get(2)?,
        })
    }

    /// Rounds to this currency's precision.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub description: String,
    pub starting_saldo: Decimal,
    pub date_created: NaiveDateTime,
    pub currency_id: i64,
    pub user_id: i64,
    pub color: String,
    pub order: i64,
}

impl Account {
    pub(crate) const COLUMNS: &'static str =
        "id, description, starting_saldo, date_created, currency_id, user_id, color, sort_order";

    pub(crate) fn from_row(r: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            description: r.get(1)?,
            starting_saldo: decimal_at(r, 2)?,
            date_created: r.get(3)?,
            currency_id: r.get(4)?,
            user_id: r.get(5)?,
            color: r.get(6)?,
            order: r.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub description: String,
    pub is_expense: bool,
    pub usable: bool,
    pub parent_id: Option<i64>,
    pub color: String,
    pub order: i64,
    pub user_id: i64,
}

impl Category {
    pub(crate) const COLUMNS: &'static str =
        "id, description, is_expense, usable, parent_id, color, sort_order, user_id";

    pub(crate) fn from_row(r: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            description: r.get(1)?,
            is_expense: r.get(2)?,
            usable: r.get(3)?,
            parent_id: r.get(4)?,
            color: r.get(5)?,
            order: r.get(6)?,
            user_id: r.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub description: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: Decimal,
    pub is_expense: bool,
    pub date_issued: NaiveDateTime,
    pub comment: String,
    pub account_id: i64,
    pub agent_id: i64,
    pub currency_id: i64,
    pub user_id: i64,
    /// The whole amount is a single flow with the primary agent.
    pub direct: bool,
}

impl Transaction {
    pub(crate) const COLUMNS: &'static str = "id, amount, is_expense, date_issued, comment, account_id, agent_id, currency_id, user_id, direct";

    pub(crate) fn from_row(r: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            amount: decimal_at(r, 1)?,
            is_expense: r.get(2)?,
            date_issued: r.get(3)?,
            comment: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            account_id: r.get(5)?,
            agent_id: r.get(6)?,
            currency_id: r.get(7)?,
            user_id: r.get(8)?,
            direct: r.get(9)?,
        })
    }

    /// Effect on the owning account's balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.is_expense { -self.amount } else { self.amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub amount: Decimal,
    pub category_id: i64,
    pub trans_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: i64,
    pub amount: Decimal,
    pub is_debt: bool,
    pub agent_id: i64,
    pub trans_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub id: i64,
    pub src_amount: Decimal,
    pub dst_amount: Decimal,
    pub src_id: i64,
    pub dst_id: i64,
    pub date_issued: NaiveDateTime,
    pub comment: String,
    pub user_id: i64,
}

impl AccountTransfer {
    pub(crate) const COLUMNS: &'static str =
        "id, src_amount, dst_amount, src_id, dst_id, date_issued, comment, user_id";

    pub(crate) fn from_row(r: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            src_amount: decimal_at(r, 1)?,
            dst_amount: decimal_at(r, 2)?,
            src_id: r.get(3)?,
            dst_id: r.get(4)?,
            date_issued: r.get(5)?,
            comment: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
            user_id: r.get(7)?,
        })
    }

    /// Effect on `account_id`: outgoing for the source, incoming for the
    /// destination, nothing otherwise.
    pub fn signed_amount_for(&self, account_id: i64) -> Decimal {
        if self.src_id == account_id {
            -self.src_amount
        } else if self.dst_id == account_id {
            self.dst_amount
        } else {
            Decimal::ZERO
        }
    }
}

// ---- Explicit projections handed to callers -------------------------------

/// Account as listed to its owner, with the replayed balance.
#[derive(Debug, Clone, Serialize)]
pub struct AccountOverview {
    #[serde(flatten)]
    pub account: Account,
    pub currency: Currency,
    pub saldo: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordDetail {
    pub id: i64,
    pub amount: Decimal,
    pub category_id: i64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowDetail {
    pub id: i64,
    pub amount: Decimal,
    pub is_debt: bool,
    pub agent_id: i64,
    pub agent: String,
}

/// Deep view of a transaction: its own fields plus the named relations.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub account: String,
    pub agent: String,
    pub currency: Currency,
    pub records: Vec<RecordDetail>,
    pub flows: Vec<FlowDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentUsage {
    #[serde(flatten)]
    pub agent: Agent,
    pub uses: i64,
}
