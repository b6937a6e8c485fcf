//! Book entity, create payload and partial update
//!
//! Wire names are camelCase (`coverUrl`) and status values lowercase, the
//! shape the catalog UI exchanges with the backend. `BookPatch` has no `id`
//! field: an `id` in an update payload is dropped on deserialization, so an
//! assigned id can never change.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Earliest publication year accepted
pub const MIN_YEAR: i32 = 1000;

/// Shortest ISBN accepted (ISBN-10 without separators)
pub const MIN_ISBN_LEN: usize = 10;

/// Highest rating
pub const MAX_RATING: f64 = 5.0;

/// Lending status of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
        }
    }
}

/// A book on the shelf. `id` is assigned by the store of record on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    pub description: String,
    pub pages: u32,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// Create payload: a book without an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    pub description: String,
    pub pages: u32,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl NewBook {
    /// Check every field constraint; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("author", &self.author)?;
        require("genre", &self.genre)?;
        require("language", &self.language)?;
        require("description", &self.description)?;

        let current_year = chrono::Utc::now().year();
        if self.year < MIN_YEAR || self.year > current_year {
            return Err(Error::Validation(format!(
                "year must be between {MIN_YEAR} and {current_year}, got {}",
                self.year
            )));
        }
        if self.pages < 1 {
            return Err(Error::Validation("pages must be greater than 0".into()));
        }
        if let Some(isbn) = &self.isbn {
            if isbn.chars().count() < MIN_ISBN_LEN {
                return Err(Error::Validation(format!(
                    "isbn must be at least {MIN_ISBN_LEN} characters"
                )));
            }
        }
        if let Some(rating) = self.rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(Error::Validation(format!(
                    "rating must be between 0 and {MAX_RATING}, got {rating}"
                )));
            }
        }
        if let Some(url) = &self.cover_url {
            reqwest::Url::parse(url)
                .map_err(|e| Error::Validation(format!("coverUrl is not a valid url: {e}")))?;
        }
        Ok(())
    }

    /// Attach an assigned id.
    pub fn with_id(self, id: impl Into<String>) -> Book {
        Book {
            id: id.into(),
            title: self.title,
            author: self.author,
            year: self.year,
            genre: self.genre,
            isbn: self.isbn,
            description: self.description,
            pages: self.pages,
            language: self.language,
            rating: self.rating,
            status: self.status,
            cover_url: self.cover_url,
        }
    }
}

impl Book {
    /// The book's fields without its id.
    pub fn details(&self) -> NewBook {
        NewBook {
            title: self.title.clone(),
            author: self.author.clone(),
            year: self.year,
            genre: self.genre.clone(),
            isbn: self.isbn.clone(),
            description: self.description.clone(),
            pages: self.pages,
            language: self.language.clone(),
            rating: self.rating,
            status: self.status,
            cover_url: self.cover_url.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.details().validate()
    }

    /// Book with `patch` merged over it. The id is kept.
    pub fn patched(&self, patch: &BookPatch) -> Book {
        let mut book = self.clone();
        if let Some(title) = &patch.title {
            book.title = title.clone();
        }
        if let Some(author) = &patch.author {
            book.author = author.clone();
        }
        if let Some(year) = patch.year {
            book.year = year;
        }
        if let Some(genre) = &patch.genre {
            book.genre = genre.clone();
        }
        if let Some(isbn) = &patch.isbn {
            book.isbn = Some(isbn.clone());
        }
        if let Some(description) = &patch.description {
            book.description = description.clone();
        }
        if let Some(pages) = patch.pages {
            book.pages = pages;
        }
        if let Some(language) = &patch.language {
            book.language = language.clone();
        }
        if let Some(rating) = patch.rating {
            book.rating = Some(rating);
        }
        if let Some(status) = patch.status {
            book.status = status;
        }
        if let Some(cover_url) = &patch.cover_url {
            book.cover_url = Some(cover_url.clone());
        }
        book
    }
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        *self == BookPatch::default()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(())
}
