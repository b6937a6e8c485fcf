//! `/books` handlers over the shared `CollectionStore`

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use catalog_books::{Book, BookPatch, BookStatus, NewBook};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    book_ids: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<Book>> {
    Json(state.books.list().await)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    state.books.get(&id).await.map(Json).ok_or_else(ApiError::not_found)
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let Json(book) = payload?;
    let book = state.books.add(book).await?;
    info!(id = %book.id, title = %book.title, "book created");
    Ok(Json(book))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> Result<Json<Book>, ApiError> {
    let Json(patch) = payload?;
    let book = state.books.update(&id, &patch).await?;
    info!(id = %book.id, "book updated");
    Ok(Json(book))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.books.remove(&id).await.ok_or_else(ApiError::not_found)?;
    info!(%id, "book deleted");
    Ok(Json(serde_json::json!({ "message": "Book deleted" })))
}

pub async fn reorder(
    State(state): State<AppState>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;
    state.books.apply_order(&request.book_ids).await?;
    info!(books = request.book_ids.len(), "books reordered");
    Ok(Json(serde_json::json!({ "message": "Books reordered" })))
}

/// The sample shelf a fresh backend starts with.
pub fn seed() -> Vec<Book> {
    vec![
        NewBook {
            title: "The Great Gatsby".into(),
            author: "F. Scott Fitzgerald".into(),
            year: 1925,
            genre: "Novel".into(),
            isbn: Some("978-0743273565".into()),
            description: "Nick Carraway is drawn into the world of his neighbour Jay Gatsby \
                          on Long Island during the Jazz Age."
                .into(),
            pages: 180,
            language: "English".into(),
            rating: Some(4.5),
            status: BookStatus::Available,
            cover_url: None,
        }
        .with_id("1"),
        NewBook {
            title: "1984".into(),
            author: "George Orwell".into(),
            year: 1949,
            genre: "Dystopian".into(),
            isbn: Some("978-0451524935".into()),
            description: "Winston Smith works for the Party in a state of perpetual war and \
                          constant surveillance."
                .into(),
            pages: 328,
            language: "English".into(),
            rating: Some(4.8),
            status: BookStatus::Borrowed,
            cover_url: None,
        }
        .with_id("2"),
        NewBook {
            title: "To Kill a Mockingbird".into(),
            author: "Harper Lee".into(),
            year: 1960,
            genre: "Novel".into(),
            isbn: Some("978-0446310789".into()),
            description: "Scout Finch grows up in a Depression-era Alabama town while her \
                          father Atticus defends a man in court."
                .into(),
            pages: 281,
            language: "English".into(),
            rating: Some(4.7),
            status: BookStatus::Available,
            cover_url: None,
        }
        .with_id("3"),
    ]
}
