//! Client facade the catalog UI talks to
//!
//! Writes go to the backend first and reach the local `CollectionStore`
//! only once the backend accepted them; reorders are the exception and run
//! optimistically through `ReorderSync`. Deletes need an explicit
//! confirmation. Outcomes the user should see are reported through the
//! `Notifier` without blocking the caller.

use std::collections::HashSet;
use std::sync::Arc;

use catalog_auth::AuthSession;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::BooksApi;
use crate::book::{Book, BookPatch, NewBook};
use crate::collection::CollectionStore;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::reorder::{ReorderOutcome, ReorderSync};
use crate::stats::Statistics;
use crate::view::BookQuery;

/// Asks the user to confirm a destructive action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    /// The user declined; nothing was sent
    pub cancelled: bool,
    pub removed: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

pub struct Catalog {
    api: BooksApi,
    store: Arc<CollectionStore>,
    reorder: ReorderSync,
    selection: Mutex<HashSet<String>>,
    notifier: Notifier,
}

impl Catalog {
    pub fn new(session: AuthSession, notifier: Notifier) -> Self {
        let api = BooksApi::new(session);
        let store = Arc::new(CollectionStore::new());
        let reorder = ReorderSync::new(store.clone(), Arc::new(api.clone()), notifier.clone());
        Self {
            api,
            store,
            reorder,
            selection: Mutex::new(HashSet::new()),
            notifier,
        }
    }

    pub fn api(&self) -> &BooksApi {
        &self.api
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    /// Replace the local shelf with the backend's list.
    pub async fn load(&self) -> Result<usize> {
        let books = self.api.list().await?;
        let count = books.len();
        self.store.replace_all(books).await;
        self.selection.lock().await.clear();
        info!(count, "catalog loaded");
        Ok(count)
    }

    pub async fn books(&self) -> Vec<Book> {
        self.store.list().await
    }

    pub async fn create(&self, book: NewBook) -> Result<Book> {
        book.validate()?;
        let created = self
            .api
            .create(&book)
            .await
            .inspect_err(|e| self.notifier.error(format!("Failed to add book: {e}")))?;
        self.store.insert(created.clone()).await?;
        self.notifier.success("Book added successfully");
        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book> {
        let current = self
            .store
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        current.patched(patch).validate()?;

        let updated = self
            .api
            .update(id, patch)
            .await
            .inspect_err(|e| self.notifier.error(format!("Failed to update book: {e}")))?;
        self.store.put(updated.clone()).await?;
        self.notifier.success("Book updated successfully");
        Ok(updated)
    }

    /// Delete one book after confirmation. `Ok(false)` when declined.
    pub async fn delete(&self, id: &str, confirm: &dyn Confirm) -> Result<bool> {
        if !confirm.confirm("Are you sure you want to delete this book?") {
            return Ok(false);
        }
        if let Err(e) = self.api.delete(id).await {
            warn!(id, error = %e, "delete failed");
            self.notifier.error(format!("Failed to delete book: {e}"));
            return Err(e);
        }
        self.store.remove(id).await;
        self.selection.lock().await.remove(id);
        self.notifier.success("Book deleted successfully");
        Ok(true)
    }

    pub async fn select(&self, id: &str) -> bool {
        if !self.store.contains(id).await {
            return false;
        }
        self.selection.lock().await.insert(id.to_string())
    }

    pub async fn deselect(&self, id: &str) -> bool {
        self.selection.lock().await.remove(id)
    }

    pub async fn clear_selection(&self) {
        self.selection.lock().await.clear();
    }

    /// Selected ids in shelf order.
    pub async fn selection(&self) -> Vec<String> {
        let selected = self.selection.lock().await.clone();
        self.store
            .order()
            .await
            .into_ids()
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect()
    }

    /// Delete every selected book after one confirmation.
    ///
    /// Each id is deleted on the backend; the ones that succeeded leave the
    /// shelf in one `bulk_remove` and leave the selection. Failures stay
    /// selected and are reported in the outcome.
    pub async fn delete_selected(&self, confirm: &dyn Confirm) -> Result<DeleteOutcome> {
        let ids = self.selection().await;
        if ids.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        if !confirm.confirm("Are you sure you want to delete these books?") {
            return Ok(DeleteOutcome {
                cancelled: true,
                ..Default::default()
            });
        }

        let mut outcome = DeleteOutcome::default();
        for id in ids {
            match self.api.delete(&id).await {
                Ok(()) => outcome.removed.push(id),
                Err(e) => {
                    warn!(id, error = %e, "bulk delete entry failed");
                    outcome.failed.push((id, e));
                }
            }
        }

        let removed: HashSet<String> = outcome.removed.iter().cloned().collect();
        self.store.bulk_remove(&removed).await;
        self.selection.lock().await.retain(|id| !removed.contains(id));

        if !outcome.removed.is_empty() {
            self.notifier.success("Books deleted successfully");
        }
        if !outcome.failed.is_empty() {
            self.notifier
                .error(format!("Failed to delete {} book(s)", outcome.failed.len()));
        }
        info!(
            removed = outcome.removed.len(),
            failed = outcome.failed.len(),
            "bulk delete finished"
        );
        Ok(outcome)
    }

    pub async fn reorder(&self, source_id: &str, target_id: &str) -> Result<ReorderOutcome> {
        self.reorder.reorder(source_id, target_id).await
    }

    /// Filtered and sorted view of the shelf. The shelf order is untouched.
    pub async fn query(&self, query: &BookQuery) -> Vec<Book> {
        query.apply(&self.store.list().await)
    }

    pub async fn statistics(&self) -> Statistics {
        Statistics::from_books(&self.store.list().await)
    }
}
