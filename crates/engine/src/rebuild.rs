//! Drop every collection of a database, ledger included.
//!
//! Collections are independent of one another, so the drops run
//! concurrently and are awaited together.

use docmigrate_store::{DocumentStore, Namespace, StoreResult};
use futures::future::join_all;
use tracing::{info, warn};

/// Outcome of [`rebuild`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub dropped: Vec<String>,
    pub failed: Vec<String>,
}

impl RebuildReport {
    pub fn attempted(&self) -> usize {
        self.dropped.len() + self.failed.len()
    }
}

/// Drop all collections in `database`.
///
/// Listing the collections is the only fatal step. A drop that errors or
/// reports nothing dropped is logged and reported as failed.
pub async fn rebuild(store: &dyn DocumentStore, database: &str) -> StoreResult<RebuildReport> {
    let names = store.list_collection_names(database).await?;

    let drops = names.iter().map(|name| async move {
        let namespace = Namespace::new(database, name.as_str());
        (name, store.drop_collection(&namespace).await)
    });

    let mut report = RebuildReport::default();
    for (name, result) in join_all(drops).await {
        match result {
            Ok(true) => {
                info!(collection = %name, "Successfully dropped collection!");
                report.dropped.push(name.clone());
            }
            Ok(false) => {
                warn!(collection = %name, "Failed to drop collection!");
                report.failed.push(name.clone());
            }
            Err(e) => {
                warn!(collection = %name, error = %e, "Failed to drop collection!");
                report.failed.push(name.clone());
            }
        }
    }

    info!("Attempted to drop {} collections!", report.attempted());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyStore, LogCapture};
    use docmigrate_store::{CollectionOptions, MemoryStore};
    use tracing::Level;

    async fn seed_collections(store: &dyn DocumentStore) {
        for name in ["users", "config.migrations"] {
            store
                .create_collection(&Namespace::new("datastore", name), CollectionOptions::default())
                .await
                .unwrap();
        }
        store
            .create_collection(&Namespace::new("other", "keep"), CollectionOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rebuild_drops_every_collection() {
        let store = MemoryStore::new();
        seed_collections(&store).await;

        let report = rebuild(&store, "datastore").await.unwrap();
        assert_eq!(report.dropped.len(), 2);
        assert!(report.failed.is_empty());
        assert!(store.list_collection_names("datastore").await.unwrap().is_empty());
        assert!(store.has_collection(&Namespace::new("other", "keep")));
    }

    #[tokio::test]
    async fn test_rebuild_empty_database() {
        let store = MemoryStore::new();
        let report = rebuild(&store, "datastore").await.unwrap();
        assert_eq!(report.attempted(), 0);
    }

    #[tokio::test]
    async fn test_failed_drops_are_reported() {
        let store = FlakyStore::new();
        seed_collections(&store).await;
        store.fail_drops(true);

        let report = rebuild(&store, "datastore").await.unwrap();
        assert!(report.dropped.is_empty());
        assert_eq!(report.failed.len(), 2);
    }

    #[tokio::test]
    async fn test_drops_that_find_nothing_are_failures() {
        let store = FlakyStore::new();
        seed_collections(&store).await;
        store.lose_drops(true);
        let capture = LogCapture::new();
        let _guard = capture.install();

        let report = rebuild(&store, "datastore").await.unwrap();

        assert!(report.dropped.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(
            capture.messages(Level::WARN),
            vec!["Failed to drop collection!", "Failed to drop collection!"]
        );
        assert_eq!(capture.count(Level::INFO), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let store = FlakyStore::new();
        store.fail_list_collections(true);
        assert!(rebuild(&store, "datastore").await.is_err());
    }
}
