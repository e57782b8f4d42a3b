// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{LedgerError, LedgerResult};
use crate::models::Currency;
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

/// Textual timestamp patterns accepted at the boundary, besides RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// Current local wall-clock time at second precision.
pub fn now() -> NaiveDateTime {
    truncate_seconds(Local::now().naive_local())
}

fn truncate_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Parses ISO-8601 (with or without offset) or `DD.MM.YYYY HH:MM`.
/// Date-only input means midnight. Offsets are converted to local time.
pub fn parse_datetime(s: &str) -> LedgerResult<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(truncate_seconds(dt.with_timezone(&Local).naive_local()));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(truncate_seconds(dt));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }
    Err(LedgerError::validation(format!(
        "Invalid date '{}', expected ISO-8601 or DD.MM.YYYY HH:MM",
        s
    )))
}

pub fn parse_decimal(s: &str) -> LedgerResult<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|_| LedgerError::validation(format!("Invalid decimal '{}'", s.trim())))
}

pub fn parse_color(s: &str) -> LedgerResult<String> {
    let s = s.trim();
    if COLOR_RE.is_match(s) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(LedgerError::validation(format!(
            "Invalid color '{}', expected #rrggbb",
            s
        )))
    }
}

/// Rejects amounts that are not strictly positive or carry more fraction
/// digits than the currency allows.
pub fn check_amount(amount: Decimal, ccy: &Currency, what: &str) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!("{} must be positive", what)));
    }
    check_precision(amount, ccy, what)
}

pub fn check_precision(amount: Decimal, ccy: &Currency, what: &str) -> LedgerResult<()> {
    if amount.normalize().scale() > ccy.decimals {
        return Err(LedgerError::validation(format!(
            "{} allows at most {} decimals for {}",
            what, ccy.decimals, ccy.code
        )));
    }
    Ok(())
}

/// Renders with thousands separators and exactly `ccy.decimals` fraction
/// digits, e.g. `1,234,567.80`.
pub fn fmt_money(d: &Decimal, ccy: &Currency) -> String {
    let rounded = d.round_dp_with_strategy(ccy.decimals, RoundingStrategy::MidpointNearestEven);
    let digits = format!("{:.*}", ccy.decimals as usize, rounded.abs());
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits.as_str(), None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // Arrays stream one element per line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
