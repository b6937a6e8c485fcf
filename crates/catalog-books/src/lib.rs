//! Book collection state for the library catalog
//!
//! Holds the ordered shelf of books and the client-side protocol around it.
//! `CollectionStore` is the single owner of the in-memory collection (the
//! backend uses it as its store of record, the client as its mirror).
//! `ReorderSync` applies drag-to-reorder moves optimistically and rolls back
//! to the captured snapshot when the backend refuses the new order.
//!
//! Client flow:
//! 1. `Catalog::load()` → `GET /books` → collection replaced in shelf order
//! 2. create/update/delete → backend first, then the local mirror
//! 3. drag completes → `Catalog::reorder()` → local move, then
//!    `POST /books/reorder` with the full order; rollback + notification on failure
//! 4. profile page → `Catalog::statistics()`

pub mod api;
pub mod book;
pub mod catalog;
pub mod collection;
pub mod error;
pub mod notify;
pub mod reorder;
pub mod stats;
pub mod view;

pub use api::BooksApi;
pub use book::{Book, BookPatch, BookStatus, NewBook};
pub use catalog::{Catalog, Confirm, DeleteOutcome};
pub use collection::{CollectionStore, OrderSnapshot};
pub use error::{Error, Result};
pub use notify::{Level, Notification, Notifier};
pub use reorder::{Reconcile, ReorderCommand, ReorderOutcome, ReorderSync, array_move};
pub use stats::Statistics;
pub use view::{BookQuery, SortKey};
