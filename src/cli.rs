// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{DB_ENV, USER_ENV};
use clap::{Arg, ArgAction, Command, value_parser};

fn json_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn json_arg(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
}

/// Fields shared by `tx add` and `tx edit`.
fn tx_fields(cmd: Command) -> Command {
    cmd.arg(Arg::new("amount").long("amount").help("Positive amount"))
        .arg(
            Arg::new("income")
                .long("income")
                .action(ArgAction::SetTrue)
                .conflicts_with("expense"),
        )
        .arg(
            Arg::new("expense")
                .long("expense")
                .action(ArgAction::SetTrue)
                .help("Default for new transactions"),
        )
        .arg(
            Arg::new("date")
                .long("date")
                .help("ISO-8601 or DD.MM.YYYY HH:MM (default: now)"),
        )
        .arg(Arg::new("agent").long("agent").help("Payee or payer"))
        .arg(Arg::new("comment").long("comment"))
        .arg(
            Arg::new("direct")
                .long("direct")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["record", "flow"])
                .help("Whole amount is a debt/settlement with the agent"),
        )
        .arg(
            Arg::new("record")
                .long("record")
                .action(ArgAction::Append)
                .value_name("CATEGORY_ID:AMOUNT"),
        )
        .arg(
            Arg::new("flow")
                .long("flow")
                .action(ArgAction::Append)
                .value_name("AGENT:AMOUNT[:debt|:credit]"),
        )
}

fn report_filters(cmd: Command) -> Command {
    json_arg(
        cmd.arg(
            Arg::new("income")
                .long("income")
                .action(ArgAction::SetTrue)
                .help("Income categories instead of expenses"),
        )
        .arg(Arg::new("currency").long("currency").help("Currency code (default: configured)"))
        .arg(Arg::new("from").long("from").help("Inclusive start"))
        .arg(Arg::new("to").long("to").help("Exclusive end")),
    )
}

pub fn build_cli() -> Command {
    Command::new("saldo")
        .about("Personal multi-account ledger")
        .version(clap::crate_version!())
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .env(DB_ENV)
                .value_name("PATH")
                .help("SQLite database file"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .env(USER_ENV)
                .help("Owner to act as"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("More logging (-v info, -vv debug)"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("user")
                .about("Owners")
                .subcommand(Command::new("add").arg(Arg::new("name").required(true)))
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("currency")
                .about("Currencies")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("code").required(true))
                        .arg(
                            Arg::new("decimals")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        ),
                )
                .subcommand(Command::new("set-default").arg(Arg::new("code").required(true)))
                .subcommand(json_arg(Command::new("list"))),
        )
        .subcommand(
            Command::new("account")
                .about("Accounts")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("saldo").default_value("0").help("Starting saldo"))
                        .arg(Arg::new("currency").long("currency"))
                        .arg(Arg::new("created").long("created").help("Creation date (default: now)"))
                        .arg(Arg::new("color").long("color").help("#rrggbb"))
                        .arg(
                            Arg::new("order")
                                .long("order")
                                .value_parser(value_parser!(i64)),
                        ),
                )
                .subcommand(json_args(Command::new("list"))),
        )
        .subcommand(
            Command::new("category")
                .about("Categories")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("income").long("income").action(ArgAction::SetTrue))
                        .arg(Arg::new("unusable").long("unusable").action(ArgAction::SetTrue))
                        .arg(
                            Arg::new("parent")
                                .long("parent")
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(Arg::new("color").long("color").help("#rrggbb"))
                        .arg(
                            Arg::new("order")
                                .long("order")
                                .value_parser(value_parser!(i64)),
                        ),
                )
                .subcommand(
                    Command::new("move")
                        .arg(Arg::new("id").required(true).value_parser(value_parser!(i64)))
                        .arg(
                            Arg::new("parent")
                                .long("parent")
                                .value_parser(value_parser!(i64))
                                .help("Omit to move to the top level"),
                        ),
                )
                .subcommand(json_arg(Command::new("list"))),
        )
        .subcommand(
            Command::new("agent")
                .about("Counter-parties")
                .subcommand(json_args(Command::new("list"))),
        )
        .subcommand(
            Command::new("tx")
                .about("Transactions")
                .subcommand(tx_fields(
                    Command::new("add").arg(Arg::new("account").long("account").required(true)),
                ))
                .subcommand(tx_fields(
                    Command::new("edit")
                        .arg(Arg::new("id").required(true).value_parser(value_parser!(i64))),
                ))
                .subcommand(json_arg(
                    Command::new("show")
                        .arg(Arg::new("id").required(true).value_parser(value_parser!(i64))),
                ))
                .subcommand(
                    Command::new("rm")
                        .arg(Arg::new("id").required(true).value_parser(value_parser!(i64))),
                ),
        )
        .subcommand(
            Command::new("transfer")
                .about("Transfers between accounts")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("from").long("from").required(true))
                        .arg(Arg::new("to").long("to").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(
                            Arg::new("dst-amount")
                                .long("dst-amount")
                                .help("Amount received (default: same as sent)"),
                        )
                        .arg(Arg::new("date").long("date"))
                        .arg(Arg::new("comment").long("comment")),
                )
                .subcommand(json_args(Command::new("list"))),
        )
        .subcommand(json_args(
            Command::new("history")
                .about("Balance history of an account")
                .arg(Arg::new("account").required(true))
                .arg(Arg::new("start").long("start").help("Inclusive"))
                .arg(Arg::new("end").long("end").help("Exclusive"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(usize)),
                ),
        ))
        .subcommand(
            Command::new("report")
                .about("Category analytics")
                .subcommand(report_filters(Command::new("sunburst")).arg(
                    Arg::new("by-agent")
                        .long("by-agent")
                        .action(ArgAction::SetTrue)
                        .help("Split leaves by agent"),
                ))
                .subcommand(report_filters(Command::new("bars"))),
        )
        .subcommand(json_arg(Command::new("doctor").about("Check stored data")))
}
