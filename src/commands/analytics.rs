// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Category rollups for charting: a sunburst tree and stacked bars.

use crate::commands::categories::CategoryTree;
use crate::commands::currencies;
use crate::error::LedgerResult;
use crate::models::Currency;
use crate::utils::{fmt_money, maybe_print_json, parse_datetime, pretty_table};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap};

pub const SUNBURST_ID: &str = "sunburst";
pub const SUNBURST_COLOR: &str = "#ff0000";

#[derive(Debug, Clone)]
pub struct AnalyticsQuery {
    pub is_expense: bool,
    pub currency_id: i64,
    /// Inclusive.
    pub min_date: Option<NaiveDateTime>,
    /// Exclusive.
    pub max_date: Option<NaiveDateTime>,
    /// Sunburst only: split category leaves further by primary agent.
    pub by_agent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunburstNode {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SunburstNode>,
}

impl SunburstNode {
    /// Sum of all leaf values below (or at) this node.
    pub fn total(&self) -> Decimal {
        self.value.unwrap_or(Decimal::ZERO) + self.children.iter().map(|c| c.total()).sum::<Decimal>()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sunburst {
    pub id: String,
    pub color: String,
    pub children: Vec<SunburstNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: String,
    pub value: Decimal,
    pub color: String,
}

/// One stacked bar per top-level category.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub category: String,
    pub color: String,
    pub series: Vec<Series>,
}

impl Bar {
    pub fn value(&self, key: &str) -> Option<Decimal> {
        self.series.iter().find(|s| s.key == key).map(|s| s.value)
    }

    pub fn total(&self) -> Decimal {
        self.series.iter().map(|s| s.value).sum()
    }
}

// Charting clients expect every series as a top-level key of the bar.
impl Serialize for Bar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + 2 * self.series.len()))?;
        map.serialize_entry("category", &self.category)?;
        map.serialize_entry("color", &self.color)?;
        for s in &self.series {
            map.serialize_entry(&s.key, &s.value)?;
            map.serialize_entry(&format!("{}_color", s.key), &s.color)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BarChart {
    pub data: Vec<Bar>,
    pub keys: Vec<String>,
    pub total: Decimal,
}

/// Record sums per category and primary agent, for records whose
/// transaction matches the currency and date window.
struct RecordSums {
    by_agent: HashMap<i64, BTreeMap<String, Decimal>>,
}

impl RecordSums {
    fn load(conn: &Connection, owner: i64, q: &AnalyticsQuery) -> LedgerResult<Self> {
        let mut stmt = conn.prepare(
            "SELECT r.category_id, a.description, r.amount
             FROM records r
             JOIN transactions t ON t.id = r.trans_id
             JOIN agents a ON a.id = t.agent_id
             WHERE t.user_id = ?1 AND t.currency_id = ?2
               AND (?3 IS NULL OR t.date_issued >= ?3)
               AND (?4 IS NULL OR t.date_issued < ?4)",
        )?;
        let rows = stmt.query_map(
            params![owner, q.currency_id, q.min_date, q.max_date],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    crate::models::decimal_at(r, 2)?,
                ))
            },
        )?;
        let mut by_agent: HashMap<i64, BTreeMap<String, Decimal>> = HashMap::new();
        for row in rows {
            let (category_id, agent, amount) = row?;
            *by_agent
                .entry(category_id)
                .or_default()
                .entry(agent)
                .or_insert(Decimal::ZERO) += amount;
        }
        Ok(Self { by_agent })
    }

    /// Own records of the category, children excluded. Zero when none.
    fn own(&self, category_id: i64) -> Decimal {
        self.by_agent
            .get(&category_id)
            .map(|m| m.values().copied().sum())
            .unwrap_or(Decimal::ZERO)
    }

    fn agents(&self, category_id: i64) -> impl Iterator<Item = (&String, &Decimal)> {
        self.by_agent.get(&category_id).into_iter().flatten()
    }
}

fn sunburst_node(
    tree: &CategoryTree,
    sums: &RecordSums,
    ccy: &Currency,
    idx: usize,
    parent_path: &str,
    by_agent: bool,
) -> SunburstNode {
    let cat = tree.node(idx);
    let path = format!("{}.{}", parent_path, cat.description);
    let mut children: Vec<SunburstNode> = tree
        .children(idx)
        .iter()
        .map(|&c| sunburst_node(tree, sums, ccy, c, &path, by_agent))
        .collect();

    if by_agent {
        children.extend(sums.agents(cat.id).map(|(agent, amount)| SunburstNode {
            id: format!("{}.{}", path, agent),
            name: agent.clone(),
            color: cat.color.clone(),
            value: Some(ccy.round(*amount)),
            children: Vec::new(),
        }));
    } else if !children.is_empty() {
        let own = sums.own(cat.id);
        if !own.is_zero() {
            children.push(SunburstNode {
                id: format!("{}.{}", path, cat.description),
                name: cat.description.clone(),
                color: cat.color.clone(),
                value: Some(ccy.round(own)),
                children: Vec::new(),
            });
        }
    }

    let value = if children.is_empty() {
        Some(ccy.round(sums.own(cat.id)))
    } else {
        None
    };
    SunburstNode {
        id: path,
        name: cat.description.clone(),
        color: cat.color.clone(),
        value,
        children,
    }
}

/// Category tree of one kind with record sums at the leaves. A category
/// without matching records is a leaf of value 0.
pub fn sunburst(conn: &Connection, owner: i64, q: &AnalyticsQuery) -> LedgerResult<Sunburst> {
    let ccy = currencies::get(conn, q.currency_id)?;
    let tree = CategoryTree::load(conn, owner)?;
    let sums = RecordSums::load(conn, owner, q)?;
    let children = tree
        .roots(q.is_expense)
        .into_iter()
        .map(|idx| sunburst_node(&tree, &sums, &ccy, idx, "", q.by_agent))
        .collect();
    Ok(Sunburst {
        id: SUNBURST_ID.to_string(),
        color: SUNBURST_COLOR.to_string(),
        children,
    })
}

/// One bar per top-level category holding a series for each category of
/// its subtree with a nonzero own sum. Every bar carries every key.
pub fn bars(conn: &Connection, owner: i64, q: &AnalyticsQuery) -> LedgerResult<BarChart> {
    let ccy = currencies::get(conn, q.currency_id)?;
    let tree = CategoryTree::load(conn, owner)?;
    let sums = RecordSums::load(conn, owner, q)?;

    let mut keys: Vec<String> = Vec::new();
    let mut key_colors: HashMap<String, String> = HashMap::new();
    let mut total = Decimal::ZERO;
    let mut data = Vec::new();

    for root in tree.roots(q.is_expense) {
        let cat = tree.node(root);
        let mut bar = Bar {
            category: cat.description.clone(),
            color: cat.color.clone(),
            series: Vec::new(),
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = tree.node(idx);
            let v = ccy.round(sums.own(node.id));
            if v > Decimal::ZERO {
                keys.push(node.description.clone());
                key_colors.insert(node.description.clone(), node.color.clone());
                total += v;
                bar.series.push(Series {
                    key: node.description.clone(),
                    value: v,
                    color: node.color.clone(),
                });
            }
            stack.extend(tree.children(idx).iter().rev());
        }
        if !bar.series.is_empty() {
            data.push(bar);
        }
    }

    for key in &keys {
        for bar in data.iter_mut() {
            if bar.value(key).is_none() {
                bar.series.push(Series {
                    key: key.clone(),
                    value: Decimal::ZERO,
                    color: key_colors.get(key).cloned().unwrap_or_default(),
                });
            }
        }
    }
    tracing::debug!(owner, bars = data.len(), keys = keys.len(), "bars aggregated");
    Ok(BarChart { data, keys, total })
}

fn query_from_args(conn: &Connection, sub: &clap::ArgMatches, by_agent: bool) -> Result<AnalyticsQuery> {
    let currency = match sub.get_one::<String>("currency") {
        Some(code) => currencies::by_code(conn, code)?,
        None => currencies::default_currency(conn)?,
    };
    Ok(AnalyticsQuery {
        is_expense: !sub.get_flag("income"),
        currency_id: currency.id,
        min_date: sub.get_one::<String>("from").map(|s| parse_datetime(s)).transpose()?,
        max_date: sub.get_one::<String>("to").map(|s| parse_datetime(s)).transpose()?,
        by_agent,
    })
}

fn sunburst_rows(node: &SunburstNode, depth: usize, ccy: &Currency, rows: &mut Vec<Vec<String>>) {
    rows.push(vec![
        format!("{}{}", "  ".repeat(depth), node.name),
        fmt_money(&node.total(), ccy),
    ]);
    for child in &node.children {
        sunburst_rows(child, depth + 1, ccy, rows);
    }
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("sunburst", sub)) => {
            let q = query_from_args(conn, sub, sub.get_flag("by-agent"))?;
            let tree = sunburst(conn, owner, &q)?;
            if !maybe_print_json(sub.get_flag("json"), false, &tree)? {
                let ccy = currencies::get(conn, q.currency_id)?;
                let mut rows = Vec::new();
                for node in &tree.children {
                    sunburst_rows(node, 0, &ccy, &mut rows);
                }
                println!("{}", pretty_table(&["Category", "Amount"], rows));
            }
        }
        Some(("bars", sub)) => {
            let q = query_from_args(conn, sub, false)?;
            let chart = bars(conn, owner, &q)?;
            if !maybe_print_json(sub.get_flag("json"), false, &chart)? {
                let ccy = currencies::get(conn, q.currency_id)?;
                let rows = chart
                    .data
                    .iter()
                    .flat_map(|bar| {
                        bar.series
                            .iter()
                            .filter(|s| !s.value.is_zero())
                            .map(|s| {
                                vec![
                                    bar.category.clone(),
                                    s.key.clone(),
                                    fmt_money(&s.value, &ccy),
                                ]
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect();
                println!("{}", pretty_table(&["Group", "Category", "Amount"], rows));
                println!("Total: {} {}", fmt_money(&chart.total, &ccy), ccy.code);
            }
        }
        _ => {}
    }
    Ok(())
}
