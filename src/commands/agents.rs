// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{LedgerError, LedgerResult, is_constraint_violation};
use crate::models::{Agent, AgentUsage};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

pub fn find(conn: &Connection, owner: i64, description: &str) -> LedgerResult<Option<Agent>> {
    let agent = conn
        .query_row(
            "SELECT id, description, user_id FROM agents WHERE user_id=?1 AND description=?2",
            params![owner, description],
            |r| {
                Ok(Agent {
                    id: r.get(0)?,
                    description: r.get(1)?,
                    user_id: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(agent)
}

pub fn get(conn: &Connection, owner: i64, id: i64) -> LedgerResult<Agent> {
    conn.query_row(
        "SELECT id, description, user_id FROM agents WHERE id=?1 AND user_id=?2",
        params![id, owner],
        |r| {
            Ok(Agent {
                id: r.get(0)?,
                description: r.get(1)?,
                user_id: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or(LedgerError::NotFound("agent"))
}

/// Looks the agent up by description and creates it when missing.
///
/// A concurrent creator that wins the race makes our insert fail on the
/// `(description, user_id)` constraint; the row is then re-read instead.
pub fn get_or_create(conn: &Connection, owner: i64, description: &str) -> LedgerResult<Agent> {
    let description = description.trim();
    if description.is_empty() {
        return Err(LedgerError::validation("agent must not be empty"));
    }
    if let Some(agent) = find(conn, owner, description)? {
        return Ok(agent);
    }
    match conn.execute(
        "INSERT INTO agents(description, user_id) VALUES (?1, ?2)",
        params![description, owner],
    ) {
        Ok(_) => {
            tracing::info!(owner, agent = description, "agent created");
            Ok(Agent {
                id: conn.last_insert_rowid(),
                description: description.to_string(),
                user_id: owner,
            })
        }
        Err(e) if is_constraint_violation(&e) => {
            tracing::warn!(owner, agent = description, "agent insert raced, re-reading");
            find(conn, owner, description)?.ok_or_else(|| {
                LedgerError::validation(format!("could not register agent '{}'", description))
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Agents ordered by how often they appear on transactions and flows.
pub fn list_agents(conn: &Connection, owner: i64) -> LedgerResult<Vec<AgentUsage>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.description, a.user_id,
                (SELECT COUNT(*) FROM transactions t WHERE t.agent_id=a.id)
              + (SELECT COUNT(*) FROM flows f WHERE f.agent_id=a.id) AS uses
         FROM agents a
         WHERE a.user_id=?1
         ORDER BY uses DESC, a.description",
    )?;
    let rows = stmt.query_map(params![owner], |r| {
        Ok(AgentUsage {
            agent: Agent {
                id: r.get(0)?,
                description: r.get(1)?,
                user_id: r.get(2)?,
            },
            uses: r.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn handle(conn: &Connection, owner: i64, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("list", sub)) = m.subcommand() {
        let items = list_agents(conn, owner)?;
        if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
            let data = items
                .into_iter()
                .map(|a| vec![a.agent.id.to_string(), a.agent.description, a.uses.to_string()])
                .collect();
            println!("{}", pretty_table(&["ID", "Agent", "Uses"], data));
        }
    }
    Ok(())
}
