//! Shared helpers for the allocation suite.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use buildseq::{
    hash_token, BuildSeqConfig, Database, Executor, Method, Request, Response, RetryConfig,
};
use tempfile::TempDir;

pub const TOKEN: &str = "release-pipeline";

/// Config that authorizes [`TOKEN`].
pub fn token_config() -> BuildSeqConfig {
    BuildSeqConfig {
        authorized_digests: vec![hash_token(TOKEN)],
        ..BuildSeqConfig::default()
    }
}

/// A 40-character commit identifier derived from `n`.
pub fn commit(n: usize) -> String {
    format!("{:040x}", n)
}

/// On-disk database in a temporary directory.
pub struct TestDb {
    pub db: Arc<Database>,
    pub dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self::with_config(token_config())
    }

    pub fn with_config(config: BuildSeqConfig) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open_with_config(dir.path(), config).expect("Failed to open database");
        TestDb { db, dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn wal_path(&self) -> PathBuf {
        self.dir.path().join("wal").join("buildseq.wal")
    }

    pub fn executor(&self) -> Executor {
        Executor::new(Arc::clone(&self.db)).expect("Failed to build executor")
    }

    /// Close the database, apply `damage` to the closed directory, then
    /// open it again. Every executor built from this handle must already be
    /// dropped.
    pub fn reopen_after(self, damage: impl FnOnce(&TestDb)) -> Self {
        let TestDb { db, dir } = self;
        drop(db);
        let closed = TestDb {
            db: Database::ephemeral(),
            dir,
        };
        damage(&closed);
        let db = Database::open(closed.dir.path()).expect("Failed to reopen database");
        TestDb {
            db,
            dir: closed.dir,
        }
    }

    /// Close and open again without touching the files.
    pub fn reopen(self) -> Self {
        self.reopen_after(|_| {})
    }
}

/// In-memory executor that accepts [`TOKEN`].
pub fn ephemeral_executor() -> Executor {
    Executor::new(Database::ephemeral_with_config(token_config()).unwrap()).unwrap()
}

pub fn allocate(executor: &Executor, series: &str, commit: &str) -> Response {
    executor.execute(
        &Request::new(Method::Post)
            .with_series(series)
            .with_commit(commit)
            .with_token(TOKEN),
    )
}

pub fn lookup(executor: &Executor, series: &str, commit: &str) -> Response {
    executor.execute(
        &Request::new(Method::Get)
            .with_series(series)
            .with_commit(commit)
            .with_token(TOKEN),
    )
}

pub fn list(executor: &Executor, series: &str) -> Response {
    executor.execute(
        &Request::new(Method::Get)
            .with_series(series)
            .with_token(TOKEN),
    )
}

/// Build numbers of a series listing, in order.
pub fn numbers(response: &Response) -> Vec<u16> {
    response
        .builds
        .as_ref()
        .map(|builds| builds.iter().map(|b| b.build_number).collect())
        .unwrap_or_default()
}
