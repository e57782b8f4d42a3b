// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::process::ExitCode;

use saldo::commands::{self, users};
use saldo::config::{self, Config};
use saldo::error::LedgerError;
use saldo::{cli, db};

fn run(cfg: &Config, matches: &clap::ArgMatches) -> Result<()> {
    let mut conn = db::open_or_init(&cfg.db_path)?;
    let owner = users::get_or_create(&conn, &cfg.user)?.id;
    tracing::debug!(user = %cfg.user, owner, "acting as owner");

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", cfg.db_path.display());
        }
        Some(("user", sub)) => users::handle(&conn, sub)?,
        Some(("currency", sub)) => commands::currencies::handle(&conn, sub)?,
        Some(("account", sub)) => commands::accounts::handle(&conn, owner, sub)?,
        Some(("category", sub)) => commands::categories::handle(&conn, owner, sub)?,
        Some(("agent", sub)) => commands::agents::handle(&conn, owner, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&mut conn, owner, sub)?,
        Some(("transfer", sub)) => commands::transfers::handle(&mut conn, owner, sub)?,
        Some(("history", sub)) => commands::balances::handle(&conn, owner, sub)?,
        Some(("report", sub)) => commands::analytics::handle(&conn, owner, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, owner, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}

/// Store failures are logged in full and shown generically.
fn report(err: &anyhow::Error) {
    let internal = match err.downcast_ref::<LedgerError>() {
        Some(e) => e.is_internal(),
        None => err.downcast_ref::<rusqlite::Error>().is_some(),
    };
    if internal {
        tracing::error!(error = %format!("{:#}", err), "internal failure");
        eprintln!("error: internal failure (details logged above)");
    } else {
        eprintln!("error: {:#}", err);
    }
}

fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();
    let cfg = match Config::from_matches(&matches) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    config::init_tracing(cfg.verbosity);

    match run(&cfg, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
