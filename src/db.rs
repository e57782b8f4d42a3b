// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;

pub fn open_or_init(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;
    }
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    tracing::debug!(path = %path.display(), "store opened");
    Ok(conn)
}

/// Fresh schema in memory, one per test.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS users(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS currencies(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        decimals INTEGER NOT NULL CHECK(decimals >= 0)
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        starting_saldo TEXT NOT NULL DEFAULT '0',
        date_created TEXT NOT NULL,
        currency_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        color TEXT NOT NULL,
        sort_order INTEGER NOT NULL,
        UNIQUE(description, user_id),
        UNIQUE(sort_order, user_id),
        FOREIGN KEY(currency_id) REFERENCES currencies(id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        is_expense INTEGER NOT NULL,
        usable INTEGER NOT NULL DEFAULT 1,
        parent_id INTEGER,
        color TEXT NOT NULL,
        sort_order INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        UNIQUE(user_id, description, is_expense),
        UNIQUE(user_id, sort_order),
        FOREIGN KEY(parent_id) REFERENCES categories(id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS agents(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description TEXT NOT NULL,
        user_id INTEGER NOT NULL,
        UNIQUE(description, user_id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        is_expense INTEGER NOT NULL,
        date_issued TEXT NOT NULL,
        comment TEXT,
        account_id INTEGER NOT NULL,
        agent_id INTEGER NOT NULL,
        currency_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        direct INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(account_id) REFERENCES accounts(id),
        FOREIGN KEY(agent_id) REFERENCES agents(id),
        FOREIGN KEY(currency_id) REFERENCES currencies(id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id, date_issued);

    CREATE TABLE IF NOT EXISTS records(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        category_id INTEGER NOT NULL,
        trans_id INTEGER NOT NULL,
        UNIQUE(category_id, trans_id),
        FOREIGN KEY(category_id) REFERENCES categories(id),
        FOREIGN KEY(trans_id) REFERENCES transactions(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_records_trans ON records(trans_id);

    CREATE TABLE IF NOT EXISTS flows(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        is_debt INTEGER NOT NULL,
        agent_id INTEGER NOT NULL,
        trans_id INTEGER NOT NULL,
        UNIQUE(agent_id, trans_id),
        FOREIGN KEY(agent_id) REFERENCES agents(id),
        FOREIGN KEY(trans_id) REFERENCES transactions(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_flows_trans ON flows(trans_id);

    CREATE TABLE IF NOT EXISTS transfers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        src_amount TEXT NOT NULL,
        dst_amount TEXT NOT NULL,
        src_id INTEGER NOT NULL,
        dst_id INTEGER NOT NULL,
        date_issued TEXT NOT NULL,
        comment TEXT,
        user_id INTEGER NOT NULL,
        CHECK(src_id != dst_id),
        FOREIGN KEY(src_id) REFERENCES accounts(id),
        FOREIGN KEY(dst_id) REFERENCES accounts(id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_transfers_src ON transfers(src_id, date_issued);
    CREATE INDEX IF NOT EXISTS idx_transfers_dst ON transfers(dst_id, date_issued);

    INSERT OR IGNORE INTO currencies(code, decimals) VALUES
        ('EUR', 2), ('USD', 2), ('GBP', 2), ('CHF', 2), ('JPY', 0);
    "#,
    )?;
    Ok(())
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}
