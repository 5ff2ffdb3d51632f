use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::error::RtbError;
use crate::inventory_loader::{InventoryLoader, Snapshot};
use crate::rank_table::RankTable;

/// Holds the current, immutable snapshot and the shared rank table.
/// `snapshot()` hands out an `Arc` usable for an entire request without
/// further locking — a swap never invalidates a reference a reader
/// already holds (§4.3, §9 "Cyclic/shared ownership").
pub struct InventoryCache {
    snapshot: ArcSwap<Snapshot>,
    rank_table: Arc<RankTable>,
    loader: Mutex<InventoryLoader>,
    refreshing: AtomicBool,
}

impl InventoryCache {
    pub fn new(loader: InventoryLoader, rank_table: Arc<RankTable>) -> Self {
        InventoryCache {
            snapshot: ArcSwap::from_pointee(Snapshot::new()),
            rank_table,
            loader: Mutex::new(loader),
            refreshing: AtomicBool::new(false),
        }
    }

    /// A handle to the current snapshot. Cheap `Arc` clone; never blocks.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Fetches a single record straight from SQL (used on callbacks, §4.6).
    pub async fn fetch_one(&self, ad_id: i64) -> Result<crate::models::inventory::InventoryRecord, RtbError> {
        let mut loader = self.loader.lock().await;
        loader.fetch_one(ad_id).await
    }

    /// Runs one refresh. Non-reentrant: a refresh already in progress
    /// causes this call to no-op rather than run concurrently (§4.3, §5).
    /// On failure the previous snapshot is retained.
    pub async fn refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("refresh already in progress, skipping this tick");
            return;
        }
        let result = {
            let mut loader = self.loader.lock().await;
            loader.load(&self.rank_table).await
        };
        match result {
            Ok((snapshot, _timing)) => {
                self.snapshot.store(Arc::new(snapshot));
            }
            Err(e) => {
                tracing::warn!("inventory refresh failed, keeping previous snapshot: {e}");
            }
        }
        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// Spawns the periodic refresh loop. Refreshes never overlap (§5).
    pub fn spawn_refresh_loop(self: Arc<Self>, interval_secs: u64) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                self.refresh().await;
            }
        });
    }
}
