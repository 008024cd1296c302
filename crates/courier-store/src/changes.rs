use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use courier_core::api::Direction;
use courier_core::path;

use crate::error::StoreError;
use crate::store::{DocumentStore, DocumentsOpts, NowFn};

/// One record in a change feed: a document reference and the feed-local
/// version it was appended at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Change {
    pub path: String,
    pub version: u64,
}

#[derive(Serialize, Deserialize)]
struct FeedMeta {
    version: u64,
}

/// Append-only change feeds over a document store. Appends are serialised
/// per process; versions are strictly increasing within a feed and read as
/// millisecond timestamps when the wall clock is ahead of the counter.
pub struct ChangeLog {
    store: Arc<dyn DocumentStore>,
    append_lock: Mutex<()>,
    now_fn: StdMutex<NowFn>,
}

impl ChangeLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
            now_fn: StdMutex::new(Arc::new(Utc::now)),
        }
    }

    pub fn set_time_now(&self, now_fn: NowFn) {
        let mut guard = self.now_fn.lock().expect("clock lock");
        *guard = now_fn;
    }

    fn now_millis(&self) -> i64 {
        let now_fn = self.now_fn.lock().expect("clock lock");
        now_fn().timestamp_millis()
    }

    fn meta_path(feed: &str) -> String {
        path::join(&["changes-meta", feed])
    }

    fn record_path(feed: &str, version: u64) -> String {
        path::join(&[feed, &format!("{:020}", version)])
    }

    /// Append a change referencing `ref_path`, returning the new version.
    /// The referenced document must exist.
    pub async fn add(&self, feed: &str, ref_path: &str) -> Result<u64, StoreError> {
        let _guard = self.append_lock.lock().await;

        if self.store.get(ref_path).await?.is_none() {
            return Err(StoreError::ReferenceMissing(ref_path.to_string()));
        }

        let meta_path = Self::meta_path(feed);
        let prev = match self.store.get(&meta_path).await? {
            Some(doc) => serde_json::from_slice::<FeedMeta>(&doc.data)
                .map_err(|e| StoreError::Decode(e.to_string()))?
                .version,
            None => 0,
        };
        let version = (prev + 1).max(self.now_millis().max(0) as u64);

        let change = Change {
            path: ref_path.to_string(),
            version,
        };
        let record = serde_json::to_vec(&change).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.store
            .create(&Self::record_path(feed, version), &record)
            .await?;

        let meta = serde_json::to_vec(&FeedMeta { version })
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        self.store.set(&meta_path, &meta).await?;

        debug!(feed = %feed, version, path = %ref_path, "change added");
        Ok(version)
    }

    /// Whether the feed has ever had an append.
    pub async fn exists(&self, feed: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&Self::meta_path(feed)).await?.is_some())
    }

    /// Scan the feed from a version cursor.
    ///
    /// Ascending: records with version > `version`, oldest first; the
    /// returned cursor is the version of the last record, or `version`
    /// unchanged when the page is empty.
    ///
    /// Descending: records with version <= `version` (or all, when
    /// `version` is 0), newest first; the returned cursor is the version of
    /// the last record in the page.
    pub async fn list(
        &self,
        feed: &str,
        version: u64,
        direction: Direction,
        limit: usize,
    ) -> Result<(Vec<Change>, u64), StoreError> {
        let docs = self
            .store
            .documents(&path::join(&[feed]), &DocumentsOpts::default())
            .await?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let change: Change = serde_json::from_slice(&doc.data)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            records.push(change);
        }

        let page: Vec<Change> = match direction {
            Direction::Asc => records
                .into_iter()
                .filter(|c| c.version > version)
                .take(limit)
                .collect(),
            Direction::Desc => {
                let upper = if version == 0 { u64::MAX } else { version };
                records
                    .into_iter()
                    .rev()
                    .filter(|c| c.version <= upper)
                    .take(limit)
                    .collect()
            }
        };

        let next = page.last().map(|c| c.version).unwrap_or(version);
        Ok((page, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Mem;
    use crate::testing::TestClock;

    async fn setup() -> (Arc<Mem>, ChangeLog) {
        let clock = TestClock::at(1_234_567_890_000);
        let store = Arc::new(Mem::new());
        store.set_time_now(clock.now_fn());
        let changes = ChangeLog::new(store.clone());
        changes.set_time_now(clock.now_fn());
        (store, changes)
    }

    #[tokio::test]
    async fn test_versions_strictly_increase() {
        let (store, changes) = setup().await;
        let mut last = 0;
        for i in 0..5 {
            let p = format!("/messages/m{}", i);
            store.set(&p, b"x").await.unwrap();
            let v = changes.add("feed", &p).await.unwrap();
            assert!(v > last);
            last = v;
        }
    }

    #[tokio::test]
    async fn test_add_requires_document() {
        let (_store, changes) = setup().await;
        assert!(matches!(
            changes.add("feed", "/messages/missing").await,
            Err(StoreError::ReferenceMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_exists() {
        let (store, changes) = setup().await;
        assert!(!changes.exists("feed").await.unwrap());
        store.set("/messages/m", b"x").await.unwrap();
        changes.add("feed", "/messages/m").await.unwrap();
        assert!(changes.exists("feed").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_ascending_with_cursor() {
        let (store, changes) = setup().await;
        let mut versions = Vec::new();
        for i in 0..3 {
            let p = format!("/messages/m{}", i);
            store.set(&p, b"x").await.unwrap();
            versions.push(changes.add("feed", &p).await.unwrap());
        }

        let (page, next) = changes.list("feed", 0, Direction::Asc, 10).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(next, versions[2]);

        // Resume after the first record.
        let (page, next) = changes
            .list("feed", versions[0], Direction::Asc, 10)
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].path, "/messages/m1");
        assert_eq!(next, versions[2]);

        // Past the end: empty page, cursor unchanged.
        let (page, next) = changes
            .list("feed", versions[2] + 1, Direction::Asc, 10)
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(next, versions[2] + 1);
    }

    #[tokio::test]
    async fn test_list_descending() {
        let (store, changes) = setup().await;
        for i in 0..3 {
            let p = format!("/messages/m{}", i);
            store.set(&p, b"x").await.unwrap();
            changes.add("feed", &p).await.unwrap();
        }

        let (page, next) = changes.list("feed", 0, Direction::Desc, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].path, "/messages/m2");
        assert_eq!(page[1].path, "/messages/m1");
        assert_eq!(next, page[1].version);

        // Page again from the cursor, inclusive upper bound.
        let (page2, _) = changes
            .list("feed", next - 1, Direction::Desc, 2)
            .await
            .unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].path, "/messages/m0");
    }

    #[tokio::test]
    async fn test_independent_feeds() {
        let (store, changes) = setup().await;
        store.set("/messages/a", b"x").await.unwrap();
        changes.add("feed-a", "/messages/a").await.unwrap();

        assert!(!changes.exists("feed-b").await.unwrap());
        let (page, _) = changes.list("feed-b", 0, Direction::Asc, 10).await.unwrap();
        assert!(page.is_empty());
    }
}
