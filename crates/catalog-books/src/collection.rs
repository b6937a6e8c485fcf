//! In-memory ordered book collection
//!
//! `CollectionStore` owns the shelf: a `Vec<Book>` whose order is the
//! user-visible order. All mutation goes through its methods, each of which
//! takes the write lock once, so every change is observed atomically.
//!
//! Order operations:
//! - `move_book` applies one optimistic move and returns the command that
//!   describes it (order before and after)
//! - `apply_order` installs an order received from elsewhere; it must be an
//!   exact permutation of the current ids
//! - `restore` puts back a captured order; ids that vanished since the
//!   snapshot are skipped and books added since go to the end

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use crate::book::{Book, BookPatch, NewBook};
use crate::error::{Error, Result};
use crate::reorder::{ReorderCommand, array_move};

/// Ids in shelf order at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderSnapshot(Vec<String>);

impl OrderSnapshot {
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn into_ids(self) -> Vec<String> {
        self.0
    }
}

#[derive(Default)]
pub struct CollectionStore {
    books: RwLock<Vec<Book>>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: Vec<Book>) -> Self {
        Self {
            books: RwLock::new(books),
        }
    }

    /// Validate `new`, assign it a fresh id and append it.
    pub async fn add(&self, new: NewBook) -> Result<Book> {
        new.validate()?;
        let book = new.with_id(uuid::Uuid::new_v4().to_string());
        self.books.write().await.push(book.clone());
        debug!(id = %book.id, "book added");
        Ok(book)
    }

    /// Append a book that already has an id.
    pub async fn insert(&self, book: Book) -> Result<()> {
        let mut books = self.books.write().await;
        if books.iter().any(|b| b.id == book.id) {
            return Err(Error::Conflict(format!("book {} already exists", book.id)));
        }
        books.push(book);
        Ok(())
    }

    /// Merge `patch` into the book with `id`. The merged book must validate;
    /// on failure nothing changes.
    pub async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book> {
        let mut books = self.books.write().await;
        let slot = books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let updated = slot.patched(patch);
        updated.validate()?;
        *slot = updated.clone();
        debug!(id, "book updated");
        Ok(updated)
    }

    /// Replace the stored copy of a book with the same id.
    pub async fn put(&self, book: Book) -> Result<()> {
        let mut books = self.books.write().await;
        let slot = books
            .iter_mut()
            .find(|b| b.id == book.id)
            .ok_or_else(|| Error::NotFound(book.id.clone()))?;
        *slot = book;
        Ok(())
    }

    /// Remove a book. Absent ids are not an error.
    pub async fn remove(&self, id: &str) -> Option<Book> {
        let mut books = self.books.write().await;
        let index = books.iter().position(|b| b.id == id)?;
        Some(books.remove(index))
    }

    /// Remove every book whose id is in `ids`, in one step. Returns the
    /// removed books in shelf order; unknown ids are ignored.
    pub async fn bulk_remove(&self, ids: &HashSet<String>) -> Vec<Book> {
        let mut books = self.books.write().await;
        let (removed, kept) = std::mem::take(&mut *books)
            .into_iter()
            .partition(|b| ids.contains(&b.id));
        *books = kept;
        removed
    }

    pub async fn list(&self) -> Vec<Book> {
        self.books.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Book> {
        self.books.read().await.iter().find(|b| b.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.books.read().await.iter().any(|b| b.id == id)
    }

    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }

    /// Current ids in shelf order.
    pub async fn order(&self) -> OrderSnapshot {
        OrderSnapshot(self.books.read().await.iter().map(|b| b.id.clone()).collect())
    }

    /// Swap in a whole collection (initial load).
    pub async fn replace_all(&self, books: Vec<Book>) {
        *self.books.write().await = books;
    }

    /// Move `source_id` to the position of `target_id`.
    ///
    /// Returns `None` without touching the shelf when the ids are equal or
    /// either is unknown.
    pub async fn move_book(&self, source_id: &str, target_id: &str) -> Option<ReorderCommand> {
        let mut books = self.books.write().await;
        let ids: Vec<String> = books.iter().map(|b| b.id.clone()).collect();
        let command = ReorderCommand::plan(&ids, source_id, target_id)?;
        array_move(&mut *books, command.from, command.to);
        Some(command)
    }

    /// Reorder the shelf to `ids`, which must be a permutation of the
    /// current ids.
    pub async fn apply_order(&self, ids: &[String]) -> Result<()> {
        let mut books = self.books.write().await;
        if ids.len() != books.len() {
            return Err(Error::ReorderConflict(format!(
                "expected {} ids, got {}",
                books.len(),
                ids.len()
            )));
        }
        let known: HashSet<&str> = books.iter().map(|b| b.id.as_str()).collect();
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !known.contains(id.as_str()) {
                return Err(Error::ReorderConflict(format!("unknown book id {id}")));
            }
            if !seen.insert(id.as_str()) {
                return Err(Error::ReorderConflict(format!("duplicate book id {id}")));
            }
        }

        let mut slots: HashMap<String, Book> = std::mem::take(&mut *books)
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        *books = ids.iter().filter_map(|id| slots.remove(id)).collect();
        Ok(())
    }

    /// Put back the order captured in `snapshot`.
    pub async fn restore(&self, snapshot: &OrderSnapshot) {
        let mut books = self.books.write().await;
        let rank: HashMap<&str, usize> = snapshot
            .ids()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let (mut known, added): (Vec<Book>, Vec<Book>) = std::mem::take(&mut *books)
            .into_iter()
            .partition(|b| rank.contains_key(b.id.as_str()));
        known.sort_by_key(|b| rank.get(b.id.as_str()).copied().unwrap_or(usize::MAX));
        known.extend(added);
        *books = known;
        debug!(books = books.len(), "order restored from snapshot");
    }
}
