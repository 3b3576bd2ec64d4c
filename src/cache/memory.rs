//! In-Memory Table Module
//!
//! A `TableStore` kept entirely in process, paging its enumeration the way a
//! hosted table service does.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{RemoteError, RowStream, TableRow, TableStore};

/// Rows returned per page when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 100;

type RowId = (String, String);
type Table = BTreeMap<RowId, TableRow>;

/// Position of an enumeration between pages.
enum Cursor {
    Start,
    After(RowId),
    Done,
}

// == Memory Table Store ==
/// Tables of rows keyed by `(partition_key, row_key)`.
#[derive(Debug)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a store whose enumerations yield `page_size` rows per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Snapshot of every row in `table`, in key order.
    pub async fn rows(&self, table: &str) -> Vec<TableRow> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Row stored under `(partition_key, row_key)`, if any.
    pub async fn row(&self, table: &str, partition_key: &str, row_key: &str) -> Option<TableRow> {
        let tables = self.tables.read().await;
        tables
            .get(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    // == Read Page ==
    /// Reads up to `page_size` rows after `after`, returning the next cursor.
    async fn read_page(&self, table: &str, after: Option<RowId>) -> Result<(Vec<TableRow>, Cursor), RemoteError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let page: Vec<TableRow> = rows
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(_, row)| row.clone())
            .collect();

        let next = match page.last() {
            Some(last) if page.len() == self.page_size => {
                Cursor::After((last.partition_key.clone(), last.row_key.clone()))
            }
            _ => Cursor::Done,
        };

        debug!(table, rows = page.len(), "read page");
        Ok((page, next))
    }
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn ensure_table(&self, table: &str) -> Result<(), RemoteError> {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default();
        Ok(())
    }

    fn query_all<'a>(&'a self, table: &'a str) -> RowStream<'a> {
        let pages = stream::unfold(Cursor::Start, move |cursor| async move {
            let after = match cursor {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::After(id) => Some(id),
            };

            match self.read_page(table, after).await {
                Ok((rows, next)) => Some((Ok(rows), next)),
                Err(err) => Some((Err(err), Cursor::Done)),
            }
        });

        Box::pin(pages.flat_map(|page| match page {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(err) => stream::iter(vec![Err(err)]),
        }))
    }

    async fn upsert(&self, table: &str, row: TableRow) -> Result<(), RemoteError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        rows.insert((row.partition_key.clone(), row.row_key.clone()), row);
        Ok(())
    }

    async fn insert(&self, table: &str, row: TableRow) -> Result<(), RemoteError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        let id = (row.partition_key.clone(), row.row_key.clone());
        if rows.contains_key(&id) {
            return Err(RemoteError::Conflict {
                partition_key: id.0,
                row_key: id.1,
            });
        }

        rows.insert(id, row);
        Ok(())
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<(), RemoteError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::TableNotFound(table.to_string()))?;

        rows.remove(&(partition_key.to_string(), row_key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    fn row(pk: &str, rk: &str) -> TableRow {
        TableRow::new(pk, rk).with_column("x", rk)
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let store = MemoryTableStore::new();
        store.upsert("t", row("pk", "a")).await.unwrap_err();

        store.ensure_table("t").await.unwrap();
        store.upsert("t", row("pk", "a")).await.unwrap();
        store.ensure_table("t").await.unwrap();

        // Re-ensuring keeps existing rows
        assert_eq!(store.rows("t").await.len(), 1);
    }

    #[tokio::test]
    async fn test_query_all_pages_through_every_partition() {
        let store = MemoryTableStore::with_page_size(2);
        store.ensure_table("t").await.unwrap();
        for (pk, rk) in [("pk", "a"), ("pk", "b"), ("other", "c"), ("pk", "d"), ("pk", "e")] {
            store.upsert("t", row(pk, rk)).await.unwrap();
        }

        let rows: Vec<TableRow> = store.query_all("t").try_collect().await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.row_key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b", "d", "e"]);

        // A second pass starts over
        let again: Vec<TableRow> = store.query_all("t").try_collect().await.unwrap();
        assert_eq!(again.len(), 5);
    }

    #[tokio::test]
    async fn test_query_all_tolerates_deletes_between_pages() {
        let store = MemoryTableStore::with_page_size(1);
        store.ensure_table("t").await.unwrap();
        for rk in ["a", "b", "c"] {
            store.upsert("t", row("pk", rk)).await.unwrap();
        }

        let mut rows = store.query_all("t");
        let mut seen = Vec::new();
        while let Some(next) = rows.next().await {
            let next = next.unwrap();
            store.delete("t", &next.partition_key, &next.row_key).await.unwrap();
            seen.push(next.row_key);
        }

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(store.rows("t").await.is_empty());
    }

    #[tokio::test]
    async fn test_query_all_missing_table() {
        let store = MemoryTableStore::new();
        let result: Result<Vec<TableRow>, RemoteError> = store.query_all("missing").try_collect().await;
        assert!(matches!(result, Err(RemoteError::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_existing_row() {
        let store = MemoryTableStore::new();
        store.ensure_table("t").await.unwrap();

        store.insert("t", row("pk", "a")).await.unwrap();
        let result = store.insert("t", row("pk", "a")).await;
        assert!(matches!(result, Err(RemoteError::Conflict { .. })));

        // Same row key under another partition is a different row
        store.insert("t", row("other", "a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_is_idempotent() {
        let store = MemoryTableStore::new();
        store.ensure_table("t").await.unwrap();

        store.upsert("t", row("pk", "a")).await.unwrap();
        store
            .upsert("t", TableRow::new("pk", "a").with_column("x", "new"))
            .await
            .unwrap();
        assert_eq!(store.row("t", "pk", "a").await.unwrap().column("x"), Some("new"));

        store.delete("t", "pk", "a").await.unwrap();
        store.delete("t", "pk", "a").await.unwrap();
        assert!(store.row("t", "pk", "a").await.is_none());
    }
}
