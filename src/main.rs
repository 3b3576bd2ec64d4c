//! Table Cache - An in-memory TTL cache backed by a remote table store
//!
//! Demo binary: fills a cache, pushes it to an in-process table, then pulls
//! it back into a second cache sharing the same partition.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use table_cache::cache::flatten_serialize;
use table_cache::{CacheConfig, CacheService, FlatMap, Flatten, MemoryTableStore, MergeMode};

#[derive(Debug, serde::Serialize)]
struct Session {
    user: String,
    visits: u32,
    theme: Option<String>,
}

impl Flatten for Session {
    fn flatten(&self) -> FlatMap {
        flatten_serialize(self).expect("Session derives Serialize with named fields")
    }
}

/// Main entry point for the table cache demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Fill a cache and synchronize it with `CACHE_SYNC_MODE` (default LocalMerge)
/// 4. Pull the partition into a fresh cache with RemoteReplace
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: table={}, partition={}, default_expiration={:?}",
        config.table_name, config.partition_key, config.default_expiration
    );

    let mode = match env::var("CACHE_SYNC_MODE") {
        Ok(value) => value.parse::<MergeMode>()?,
        Err(_) => MergeMode::default(),
    };

    let remote = Arc::new(MemoryTableStore::new());

    let mut writer = CacheService::new(remote.clone(), config.clone())
        .context("failed to create writer cache")?;
    writer.set_with_expiration(
        "session:42",
        Session {
            user: "ada".to_string(),
            visits: 3,
            theme: None,
        },
        Some(Duration::from_secs(3600)),
    );
    writer.set(
        "flags",
        FlatMap::from([("beta".to_string(), "on".to_string())]),
    );

    let report = writer.synchronize(mode).await.context("writer synchronization failed")?;
    info!("Writer synchronized: {}", serde_json::to_string(&report)?);

    let mut reader = CacheService::new(remote, config).context("failed to create reader cache")?;
    let report = reader
        .synchronize(MergeMode::RemoteReplace)
        .await
        .context("reader synchronization failed")?;
    info!("Reader synchronized: {}", serde_json::to_string(&report)?);

    for key in ["session:42", "flags"] {
        let value = reader.get(key)?.flatten();
        info!("{} => {:?}", key, value);
    }

    Ok(())
}
