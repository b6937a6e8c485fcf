//! Reading statistics for the profile page

use std::collections::BTreeMap;

use serde::Serialize;

use crate::book::{Book, BookStatus};

/// Aggregates over a snapshot of the shelf. Maps are sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub available: usize,
    pub borrowed: usize,
    pub total_pages: u64,
    /// Mean over rated books only; `None` when nothing is rated
    pub average_rating: Option<f64>,
    pub by_genre: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
    /// Keyed by the first year of the decade (1920 covers 1920..=1929)
    pub by_decade: BTreeMap<i32, usize>,
}

impl Statistics {
    pub fn from_books(books: &[Book]) -> Self {
        let mut stats = Statistics {
            total: books.len(),
            ..Default::default()
        };
        let mut rating_sum = 0.0;
        let mut rated = 0usize;

        for book in books {
            match book.status {
                BookStatus::Available => stats.available += 1,
                BookStatus::Borrowed => stats.borrowed += 1,
            }
            stats.total_pages += u64::from(book.pages);
            if let Some(rating) = book.rating {
                rating_sum += rating;
                rated += 1;
            }
            *stats.by_genre.entry(book.genre.clone()).or_default() += 1;
            *stats.by_language.entry(book.language.clone()).or_default() += 1;
            *stats.by_decade.entry(decade_of(book.year)).or_default() += 1;
        }

        if rated > 0 {
            stats.average_rating = Some(rating_sum / rated as f64);
        }
        stats
    }

    /// Genre with the most books; ties go to the alphabetically first.
    pub fn top_genre(&self) -> Option<&str> {
        self.by_genre
            .iter()
            .fold(None, |best: Option<(&String, usize)>, (genre, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((genre, count)),
            })
            .map(|(genre, _)| genre.as_str())
    }
}

pub fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}
