//! Sync Engine Module
//!
//! Reconciles a [`LocalStore`] with one partition of a remote table.
//!
//! # Merge Modes
//! - `LocalReplace` - delete the remote partition, then insert every local entry
//! - `RemoteReplace` - clear the local store, then pull every remote row
//! - `LocalMerge` - push local entries, then pull remote rows (local wins)
//! - `RemoteMerge` - pull remote rows, then push local entries (remote wins)
//!
//! Passes are not transactional. A failure or cancellation stops the pass
//! where it is; rows already written or deleted stay that way. Every row
//! operation is idempotent, so re-running the pass is the recovery path.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{LocalStore, RemoteError, RowCodec, TableStore};
use crate::error::{CacheError, Result};

// == Merge Mode ==
/// Conflict policy applied by a synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeMode {
    /// All remote data is overwritten with local data
    LocalReplace,
    /// All local data is overwritten with remote data
    RemoteReplace,
    /// Local data takes precedence on conflicts
    #[default]
    LocalMerge,
    /// Remote data takes precedence on conflicts
    RemoteMerge,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::LocalReplace => "LocalReplace",
            MergeMode::RemoteReplace => "RemoteReplace",
            MergeMode::LocalMerge => "LocalMerge",
            MergeMode::RemoteMerge => "RemoteMerge",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "localreplace" => Ok(MergeMode::LocalReplace),
            "remotereplace" => Ok(MergeMode::RemoteReplace),
            "localmerge" => Ok(MergeMode::LocalMerge),
            "remotemerge" => Ok(MergeMode::RemoteMerge),
            _ => Err(CacheError::InvalidConfig(format!("unknown merge mode \"{}\"", s))),
        }
    }
}

// == Sync Report ==
/// Counters for one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: MergeMode,
    /// Local entries written to the remote table
    pub pushed: usize,
    /// Remote rows decoded into the local store
    pub pulled: usize,
    /// Remote rows deleted
    pub deleted: usize,
    /// Remote rows ignored because they belong to another partition
    pub skipped: usize,
    /// Expired local entries dropped before pushing
    pub evicted: usize,
}

// == Sync Engine ==
/// Runs synchronization passes against one table and partition.
#[derive(Clone)]
pub struct SyncEngine {
    remote: Arc<dyn TableStore>,
    codec: RowCodec,
    table: String,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("table", &self.table)
            .field("partition_key", &self.codec.partition_key())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn TableStore>, codec: RowCodec, table: impl Into<String>) -> Self {
        Self {
            remote,
            codec,
            table: table.into(),
        }
    }

    pub fn codec(&self) -> &RowCodec {
        &self.codec
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    // == Run ==
    /// Runs one complete pass in `mode`.
    ///
    /// Phases run strictly one after the other; the second observes the
    /// effects of the first.
    pub async fn run(
        &self,
        store: &mut LocalStore,
        mode: MergeMode,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            mode,
            ..SyncReport::default()
        };

        info!(table = %self.table, partition = %self.codec.partition_key(), %mode, "synchronization started");

        let outcome = self.run_phases(store, mode, cancel, &mut report).await;

        match &outcome {
            Ok(()) => info!(
                %mode,
                pushed = report.pushed,
                pulled = report.pulled,
                deleted = report.deleted,
                skipped = report.skipped,
                "synchronization finished"
            ),
            Err(err) => warn!(
                %mode,
                pushed = report.pushed,
                pulled = report.pulled,
                deleted = report.deleted,
                error = %err,
                "synchronization aborted, partial effects are kept"
            ),
        }

        outcome.map(|()| report)
    }

    async fn run_phases(
        &self,
        store: &mut LocalStore,
        mode: MergeMode,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<()> {
        until_cancelled(cancel, self.remote.ensure_table(&self.table)).await??;

        match mode {
            MergeMode::LocalReplace => {
                self.clear_remote(cancel, report).await?;
                self.push(store, cancel, report, true).await?;
            }
            MergeMode::RemoteReplace => {
                store.clear();
                self.pull(store, cancel, report).await?;
            }
            MergeMode::LocalMerge => {
                self.push(store, cancel, report, false).await?;
                self.pull(store, cancel, report).await?;
            }
            MergeMode::RemoteMerge => {
                self.pull(store, cancel, report).await?;
                self.push(store, cancel, report, false).await?;
            }
        }

        Ok(())
    }

    // == Pull ==
    /// Decodes every row of the partition into the store, overwriting matching keys.
    async fn pull(
        &self,
        store: &mut LocalStore,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut rows = self.remote.query_all(&self.table);

        while let Some(row) = until_cancelled(cancel, rows.next()).await? {
            let row = row?;
            if row.partition_key != self.codec.partition_key() {
                debug!(partition = %row.partition_key, row_key = %row.row_key, "skipping foreign row");
                report.skipped += 1;
                continue;
            }

            let (key, entry) = self.codec.decode(row)?;
            store.insert_entry(key, entry);
            report.pulled += 1;
        }

        Ok(())
    }

    // == Push ==
    /// Writes every live local entry to the partition.
    ///
    /// With `insert_only`, an existing row is reported as
    /// [`CacheError::InsertConflict`] instead of being overwritten.
    async fn push(
        &self,
        store: &mut LocalStore,
        cancel: &CancellationToken,
        report: &mut SyncReport,
        insert_only: bool,
    ) -> Result<()> {
        report.evicted += store.evict_expired();

        for (key, entry) in store.iter() {
            let row = self.codec.encode(key, entry)?;

            if insert_only {
                until_cancelled(cancel, self.remote.insert(&self.table, row))
                    .await?
                    .map_err(|err| match err {
                        RemoteError::Conflict { .. } => CacheError::InsertConflict { key: key.clone() },
                        other => other.into(),
                    })?;
            } else {
                until_cancelled(cancel, self.remote.upsert(&self.table, row)).await??;
            }

            report.pushed += 1;
        }

        Ok(())
    }

    // == Clear Remote ==
    /// Deletes every row of the partition. Rows of other partitions are left alone.
    async fn clear_remote(&self, cancel: &CancellationToken, report: &mut SyncReport) -> Result<()> {
        let mut rows = self.remote.query_all(&self.table);

        while let Some(row) = until_cancelled(cancel, rows.next()).await? {
            let row = row?;
            if row.partition_key != self.codec.partition_key() {
                report.skipped += 1;
                continue;
            }

            until_cancelled(
                cancel,
                self.remote.delete(&self.table, &row.partition_key, &row.row_key),
            )
            .await??;
            report.deleted += 1;
        }

        Ok(())
    }
}

/// Awaits `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_mode_default() {
        assert_eq!(MergeMode::default(), MergeMode::LocalMerge);
    }

    #[test]
    fn test_merge_mode_parse() {
        assert_eq!("LocalReplace".parse::<MergeMode>().unwrap(), MergeMode::LocalReplace);
        assert_eq!("remote-replace".parse::<MergeMode>().unwrap(), MergeMode::RemoteReplace);
        assert_eq!("local_merge".parse::<MergeMode>().unwrap(), MergeMode::LocalMerge);
        assert_eq!(" REMOTEMERGE ".parse::<MergeMode>().unwrap(), MergeMode::RemoteMerge);
        assert!(matches!("sideways".parse::<MergeMode>(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_merge_mode_display_round_trips() {
        for mode in [
            MergeMode::LocalReplace,
            MergeMode::RemoteReplace,
            MergeMode::LocalMerge,
            MergeMode::RemoteMerge,
        ] {
            assert_eq!(mode.to_string().parse::<MergeMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_merge_mode_serde() {
        let json = serde_json::to_string(&MergeMode::RemoteMerge).unwrap();
        assert_eq!(json, "\"RemoteMerge\"");
        let mode: MergeMode = serde_json::from_str("\"LocalReplace\"").unwrap();
        assert_eq!(mode, MergeMode::LocalReplace);
    }

    #[tokio::test]
    async fn test_until_cancelled() {
        let cancel = CancellationToken::new();
        assert_eq!(until_cancelled(&cancel, async { 7 }).await.unwrap(), 7);

        cancel.cancel();
        let result = until_cancelled(&cancel, async { 7 }).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[tokio::test]
    async fn test_until_cancelled_interrupts_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = until_cancelled(&cancel, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }
}
