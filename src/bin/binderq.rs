// src/bin/binderq.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};

mod commands;
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    let app = Command::new("binderq")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Background job queues and admin board for the recipe binder app")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Start the HTTP server (producer endpoints + admin board)")
                .arg(Arg::new("memory")
                    .long("memory")
                    .help("Use an in-process broker instead of Redis")
                    .action(ArgAction::SetTrue))
        )
        .subcommand(
            Command::new("stats")
                .about("Show job counts per queue")
                .arg(Arg::new("queue")
                    .short('q')
                    .long("queue")
                    .value_name("QUEUE")
                    .help("Only show this queue"))
        )
        .subcommand(
            Command::new("enqueue")
                .about("Add a job to a queue")
                .arg(Arg::new("queue")
                    .short('q')
                    .long("queue")
                    .value_name("QUEUE")
                    .help("recommendations, trending or import")
                    .required(true))
                .arg(Arg::new("name")
                    .short('n')
                    .long("name")
                    .value_name("NAME")
                    .help("Job name")
                    .required(true))
                .arg(Arg::new("data")
                    .short('d')
                    .long("data")
                    .value_name("JSON")
                    .help("Job payload as JSON")
                    .default_value("{}"))
                .arg(Arg::new("delay")
                    .long("delay")
                    .value_name("SECONDS")
                    .help("Delay execution by N seconds")
                    .value_parser(clap::value_parser!(u64)))
        )
        .subcommand(
            Command::new("token")
                .about("Mint a session token for local testing")
                .arg(Arg::new("user")
                    .short('u')
                    .long("user")
                    .value_name("USER_ID")
                    .required(true))
                .arg(Arg::new("email")
                    .short('e')
                    .long("email")
                    .value_name("EMAIL")
                    .required(true))
                .arg(Arg::new("ttl")
                    .long("ttl")
                    .value_name("HOURS")
                    .help("Token lifetime in hours")
                    .default_value("24")
                    .value_parser(clap::value_parser!(i64)))
        );

    let matches = app.get_matches();
    binderq::telemetry::init();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => serve_command(sub_matches).await,
        Some(("stats", sub_matches)) => stats_command(sub_matches).await,
        Some(("enqueue", sub_matches)) => enqueue_command(sub_matches).await,
        Some(("token", sub_matches)) => token_command(sub_matches),
        _ => unreachable!("clap requires a subcommand"),
    }
}
