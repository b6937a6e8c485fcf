//! Optimistic reorder with server reconciliation
//!
//! A drag-to-reorder is a reversible `ReorderCommand`: the order before the
//! move, the order after it, and the positions involved. `ReorderSync` runs
//! each command through three steps:
//!
//! 1. apply the move to the `CollectionStore` (visible immediately)
//! 2. send the full new order to the `Reconcile` implementation
//! 3. on failure restore the `before` order, emit one error notification
//!    and return the error; on success do nothing more
//!
//! Reorders are serialized on a lane: a second move waits until the first
//! one's reconciliation settles and then takes its own snapshot, so a
//! rollback never undoes a move it did not make.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::collection::{CollectionStore, OrderSnapshot};
use crate::error::Result;
use crate::notify::Notifier;

/// Move the element at `from` to `to`, shifting the elements in between.
///
/// Out-of-range positions leave the slice untouched.
pub fn array_move<T>(items: &mut [T], from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    if from < to {
        items[from..=to].rotate_left(1);
    } else {
        items[to..=from].rotate_right(1);
    }
}

/// One reversible move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCommand {
    pub source_id: String,
    pub target_id: String,
    pub from: usize,
    pub to: usize,
    pub before: OrderSnapshot,
    pub after: Vec<String>,
}

impl ReorderCommand {
    /// Plan moving `source_id` onto `target_id`'s position in `order`.
    ///
    /// `None` when the ids are equal or either is missing.
    pub fn plan(order: &[String], source_id: &str, target_id: &str) -> Option<Self> {
        if source_id == target_id {
            return None;
        }
        let from = order.iter().position(|id| id == source_id)?;
        let to = order.iter().position(|id| id == target_id)?;
        let mut after = order.to_vec();
        array_move(&mut after, from, to);
        Some(Self {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            from,
            to,
            before: OrderSnapshot::new(order.to_vec()),
            after,
        })
    }
}

/// Confirms a new shelf order with the store of record.
pub trait Reconcile: Send + Sync {
    fn reconcile<'a>(
        &'a self,
        order: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Same id, or an id not on the shelf
    Unchanged,
    /// Applied and confirmed; the new order
    Applied(Vec<String>),
}

pub struct ReorderSync {
    store: Arc<CollectionStore>,
    reconciler: Arc<dyn Reconcile>,
    notifier: Notifier,
    lane: Mutex<()>,
}

impl ReorderSync {
    pub fn new(
        store: Arc<CollectionStore>,
        reconciler: Arc<dyn Reconcile>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            reconciler,
            notifier,
            lane: Mutex::new(()),
        }
    }

    /// Move `source_id` to `target_id`'s position and reconcile.
    pub async fn reorder(&self, source_id: &str, target_id: &str) -> Result<ReorderOutcome> {
        let _lane = self.lane.lock().await;

        let Some(command) = self.store.move_book(source_id, target_id).await else {
            debug!(source_id, target_id, "reorder is a no-op");
            return Ok(ReorderOutcome::Unchanged);
        };
        debug!(
            source_id,
            target_id,
            from = command.from,
            to = command.to,
            "order applied locally, reconciling"
        );

        match self.reconciler.reconcile(&command.after).await {
            Ok(()) => {
                metrics::counter!("catalog_reorder_total", "outcome" => "confirmed").increment(1);
                info!(source_id, target_id, "reorder confirmed");
                Ok(ReorderOutcome::Applied(command.after))
            }
            Err(e) => {
                metrics::counter!("catalog_reorder_total", "outcome" => "rolled_back").increment(1);
                warn!(source_id, target_id, error = %e, "reorder rejected, restoring previous order");
                self.store.restore(&command.before).await;
                self.notifier.error(format!("Failed to save new order: {e}"));
                Err(e)
            }
        }
    }

    /// Whether a reorder is currently applying or reconciling.
    pub fn in_flight(&self) -> bool {
        self.lane.try_lock().is_err()
    }
}
