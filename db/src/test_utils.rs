//! Shared test utilities for runner and integration tests.
//!
//! This module provides a connection provider that counts the connections it
//! opens and releases, plus helpers that seed a SQLite file with the standard
//! `t(a, b, c)` fixture.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::backend::sqlite::{SqliteConnection, DEFAULT_BUSY_TIMEOUT};
use crate::backend::Connection;
use crate::error::DbError;
use crate::query::Query;
use crate::runner::{Execute, Runner};

/// Rows of the fixture table `t(a, b, c)`.
pub const SEED_ROWS: [(i64, i64, i64); 3] = [(1, 2, 3), (2, 3, 4), (5, 6, 7)];

/// Statement that creates and fills the fixture table.
pub const SEED_SQL: &str = "CREATE TABLE t (a INTEGER, b INTEGER, c INTEGER);
INSERT INTO t VALUES (1, 2, 3), (2, 3, 4), (5, 6, 7);";

/// Connection provider that records every open and release.
#[derive(Clone, Debug)]
pub struct TrackedProvider {
    path: Option<PathBuf>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl TrackedProvider {
    /// Provider over the SQLite file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Provider whose every open fails.
    pub fn failing() -> Self {
        Self {
            path: None,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds a runner over this provider.
    pub fn runner(&self) -> Runner {
        let provider = self.clone();
        let disposer = self.clone();
        Runner::new(
            move || {
                let provider = provider.clone();
                async move {
                    let Some(path) = provider.path.as_ref() else {
                        return Err(DbError::ConnectionFailed {
                            message: "provider configured to fail".to_string(),
                        });
                    };
                    let conn = SqliteConnection::open(path, DEFAULT_BUSY_TIMEOUT).await?;
                    provider.opened.fetch_add(1, Ordering::SeqCst);
                    Ok::<Box<dyn Connection>, DbError>(Box::new(conn))
                }
                .boxed()
            },
            move |conn| {
                let released = Arc::clone(&disposer.released);
                async move {
                    conn.close().await;
                    released.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            },
        )
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet released.
    pub fn live(&self) -> usize {
        self.opened() - self.released()
    }

    /// Panics unless every opened connection was released exactly once.
    pub fn assert_all_released(&self) {
        assert_eq!(
            self.opened(),
            self.released(),
            "expected every opened connection to be released"
        );
    }
}

/// Creates a temporary SQLite file holding the fixture table.
///
/// The returned directory must be kept alive for as long as the file is used.
pub async fn seeded_database() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("fixture.db");
    let conn = SqliteConnection::open(&path, DEFAULT_BUSY_TIMEOUT)
        .await
        .expect("Failed to open fixture database");
    conn.create_command(&Query::plain(SEED_SQL))
        .expect("Failed to build seed command")
        .execute_non_query(&CancellationToken::new())
        .await
        .expect("Seeding should succeed");
    conn.close().await;
    (dir, path)
}

/// Seeds a fixture database and returns a tracked runner over it.
pub async fn seeded_runner() -> (Runner, TrackedProvider, TempDir) {
    let (dir, path) = seeded_database().await;
    let tracker = TrackedProvider::new(&path);
    (tracker.runner(), tracker, dir)
}

/// Runs `sql` for its side effects, panicking on failure.
pub async fn exec(runner: &Runner, sql: &str) -> u64 {
    runner
        .run_no_result(&Query::plain(sql), &CancellationToken::new())
        .await
        .expect("Statement should succeed")
}
