//! Test modules for the executor crate.


use crate::{Executor, Method, Request};
use buildseq_engine::{BuildSeqConfig, Database};
use buildseq_security::hash_token;

pub const TOKEN: &str = "ci-secret-token";
pub const COMMIT_A: &str = "931ad6480dce38486a221119bccd0a35e5cdbb81";
pub const COMMIT_B: &str = "784ec286c3b0292b2aece78a2300c55143932360";
pub const COMMIT_C: &str = "3e273e617a0adba491e9879f6aabf7915db0f432";

/// Executor over a fresh in-memory database accepting [`TOKEN`].
pub fn executor() -> Executor {
    let config = BuildSeqConfig {
        authorized_digests: vec![hash_token(TOKEN)],
        ..Default::default()
    };
    Executor::new(Database::ephemeral_with_config(config).unwrap()).unwrap()
}

/// Authenticated request builder.
pub fn request(method: Method, series: Option<&str>, commit: Option<&str>) -> Request {
    let mut request = Request::new(method).with_token(TOKEN);
    request.series = series.map(str::to_string);
    request.commit = commit.map(str::to_string);
    request
}
