//! buildseq CLI: allocate and query build numbers in a local database.
//!
//! `buildseq [--db <dir> | --cache] [--json] [--token <t>] <subcommand>`
//!
//! Request subcommands exit 0 on a 2xx status and 1 otherwise.

mod commands;
mod format;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use buildseq_engine::{BuildSeqConfig, Database, CONFIG_FILE_NAME};
use buildseq_executor::{Executor, Method, Request};
use buildseq_security::hash_token;
use tracing_subscriber::EnvFilter;

use commands::{build_cli, DEFAULT_DB};
use format::{format_response, OutputMode};

fn main() {
    init_logging();

    let matches = build_cli().get_matches();
    match run(&matches) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(matches: &clap::ArgMatches) -> Result<i32> {
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let token = matches.get_one::<String>("token").cloned();

    let request = match matches.subcommand() {
        Some(("hash-token", sub)) => {
            let value = sub
                .get_one::<String>("value")
                .context("missing token value")?;
            println!("{}", hash_token(value));
            return Ok(0);
        }
        Some(("init", _)) => {
            let path = db_path(matches);
            let db = Database::open(path)
                .with_context(|| format!("Failed to initialize {}", path.display()))?;
            db.shutdown()?;
            println!("Initialized {}", path.join(CONFIG_FILE_NAME).display());
            return Ok(0);
        }
        Some(("allocate", sub)) => Request::new(Method::Post)
            .with_series(arg(sub, "series")?)
            .with_commit(arg(sub, "commit")?),
        Some(("lookup", sub)) => Request::new(Method::Get)
            .with_series(arg(sub, "series")?)
            .with_commit(arg(sub, "commit")?),
        Some(("list", sub)) => Request::new(Method::Get).with_series(arg(sub, "series")?),
        _ => anyhow::bail!("no subcommand given, see --help"),
    };
    let request = match &token {
        Some(token) => request.with_token(token.as_str()),
        None => request,
    };

    let db = open_database(matches, token.as_deref())?;
    let executor = Executor::new(Arc::clone(&db)).context("Invalid configuration")?;
    let response = executor.execute(&request);
    println!("{}", format_response(&response, mode));
    db.shutdown()?;

    Ok(if response.is_success() { 0 } else { 1 })
}

fn arg<'a>(matches: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>", name))
}

fn db_path(matches: &clap::ArgMatches) -> &Path {
    Path::new(
        matches
            .get_one::<String>("db")
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_DB),
    )
}

fn open_database(matches: &clap::ArgMatches, token: Option<&str>) -> Result<Arc<Database>> {
    if matches.get_flag("cache") {
        let config = BuildSeqConfig {
            authorized_digests: token.map(hash_token).into_iter().collect(),
            ..Default::default()
        };
        Database::ephemeral_with_config(config).context("Failed to open cache database")
    } else {
        let path = db_path(matches);
        Database::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))
    }
}
