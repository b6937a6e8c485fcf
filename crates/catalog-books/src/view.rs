//! Transient filter and sort over a shelf snapshot
//!
//! A `BookQuery` produces a new list; it never reorders the collection.

use std::cmp::Ordering;

use crate::book::Book;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Author,
    Year,
}

/// Empty filter lists match everything. Sorting is stable, so books that
/// compare equal keep their shelf order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub sort: Option<SortKey>,
    pub descending: bool,
}

impl BookQuery {
    pub fn matches(&self, book: &Book) -> bool {
        (self.genres.is_empty() || self.genres.contains(&book.genre))
            && (self.languages.is_empty() || self.languages.contains(&book.language))
    }

    pub fn apply(&self, books: &[Book]) -> Vec<Book> {
        let mut view: Vec<Book> = books.iter().filter(|b| self.matches(b)).cloned().collect();
        if let Some(key) = self.sort {
            view.sort_by(|a, b| {
                let ordering = compare(key, a, b);
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        view
    }
}

fn compare(key: SortKey, a: &Book, b: &Book) -> Ordering {
    match key {
        SortKey::Title => text_order(&a.title, &b.title),
        SortKey::Author => text_order(&a.author, &b.author),
        SortKey::Year => a.year.cmp(&b.year),
    }
}

/// Case-insensitive first, byte order as the tie-break.
fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Distinct genres in shelf order, for filter menus.
pub fn genres(books: &[Book]) -> Vec<String> {
    distinct(books.iter().map(|b| &b.genre))
}

/// Distinct languages in shelf order, for filter menus.
pub fn languages(books: &[Book]) -> Vec<String> {
    distinct(books.iter().map(|b| &b.language))
}

fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}
