//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Default data directory when `--db` is not given.
pub const DEFAULT_DB: &str = ".buildseq";

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("buildseq")
        .about("Allocate sequential build numbers per release series")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .help("Data directory (default: .buildseq)")
                .global(true),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .help("Ephemeral in-memory database that accepts --token")
                .action(ArgAction::SetTrue)
                .conflicts_with("db")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .env("BUILDSEQ_TOKEN")
                .hide_env_values(true)
                .help("API token")
                .global(true),
        )
        .subcommand(build_allocate())
        .subcommand(build_lookup())
        .subcommand(build_list())
        .subcommand(build_hash_token())
        .subcommand(build_init())
}

fn series_arg() -> Arg {
    Arg::new("series")
        .required(true)
        .help("Release series, <major>.<minor>")
}

fn commit_arg() -> Arg {
    Arg::new("commit").required(true).help("Commit identifier")
}

fn build_allocate() -> Command {
    Command::new("allocate")
        .about("Return the build number of a commit, allocating the next one if new")
        .arg(series_arg())
        .arg(commit_arg())
}

fn build_lookup() -> Command {
    Command::new("lookup")
        .about("Return the build number of a commit without allocating")
        .arg(series_arg())
        .arg(commit_arg())
}

fn build_list() -> Command {
    Command::new("list")
        .about("List all builds of a series")
        .arg(series_arg())
}

fn build_hash_token() -> Command {
    Command::new("hash-token")
        .about("Print the digest of a token for authorized_digests")
        .arg(Arg::new("value").required(true).help("Token to hash"))
}

fn build_init() -> Command {
    Command::new("init").about("Create the data directory and default config")
}
