// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{LedgerError, LedgerResult, is_constraint_violation};
use crate::models::User;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

pub fn find(conn: &Connection, username: &str) -> LedgerResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username FROM users WHERE username=?1",
            params![username],
            |r| {
                Ok(User {
                    id: r.get(0)?,
                    username: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Resolves an owner by name, creating it on first use.
pub fn get_or_create(conn: &Connection, username: &str) -> LedgerResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LedgerError::validation("username must not be empty"));
    }
    if let Some(user) = find(conn, username)? {
        return Ok(user);
    }
    match conn.execute("INSERT INTO users(username) VALUES (?1)", params![username]) {
        Ok(_) => {
            tracing::info!(username, "owner created");
            Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
            })
        }
        Err(e) if is_constraint_violation(&e) => find(conn, username)?
            .ok_or_else(|| LedgerError::validation(format!("could not create user '{}'", username))),
        Err(e) => Err(e.into()),
    }
}

pub fn list(conn: &Connection) -> LedgerResult<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, username FROM users ORDER BY username")?;
    let rows = stmt.query_map([], |r| {
        Ok(User {
            id: r.get(0)?,
            username: r.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let user = get_or_create(conn, name)?;
            println!("User '{}' (id {})", user.username, user.id);
        }
        Some(("list", _)) => {
            let data = list(conn)?
                .into_iter()
                .map(|u| vec![u.id.to_string(), u.username])
                .collect();
            println!("{}", pretty_table(&["ID", "Username"], data));
        }
        _ => {}
    }
    Ok(())
}
