//! Typed client for the `/books` surface
//!
//! Every call goes through `AuthSession::send`, so bearer credentials and
//! token refresh are handled below this layer. Status mapping:
//!
//! - transport failure → `Network`
//! - 2xx → decoded body
//! - 404 → `NotFound`
//! - 409 → `ReorderConflict` on the reorder endpoint, `Conflict` elsewhere
//! - 400 / 422 → `Validation`
//! - anything else → `Http { status, message }`

use std::future::Future;
use std::pin::Pin;

use catalog_auth::AuthSession;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use transport::{ApiRequest, ApiResponse};

use crate::book::{Book, BookPatch, NewBook};
use crate::error::{Error, Result};
use crate::reorder::Reconcile;

pub const BOOKS_PATH: &str = "/books";
pub const REORDER_PATH: &str = "/books/reorder";

#[derive(Clone)]
pub struct BooksApi {
    session: AuthSession,
}

impl BooksApi {
    pub fn new(session: AuthSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub async fn list(&self) -> Result<Vec<Book>> {
        let response = self.call(ApiRequest::get(BOOKS_PATH), None).await?;
        decode(&response)
    }

    pub async fn get(&self, id: &str) -> Result<Book> {
        let response = self.call(ApiRequest::get(book_path(id)), Some(id)).await?;
        decode(&response)
    }

    pub async fn create(&self, book: &NewBook) -> Result<Book> {
        let request = ApiRequest::post(BOOKS_PATH, to_body(book)?);
        let response = self.call(request, None).await?;
        decode(&response)
    }

    pub async fn update(&self, id: &str, patch: &BookPatch) -> Result<Book> {
        let request = ApiRequest::put(book_path(id), to_body(patch)?);
        let response = self.call(request, Some(id)).await?;
        decode(&response)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.call(ApiRequest::delete(book_path(id)), Some(id)).await?;
        Ok(())
    }

    /// Send the complete shelf order.
    pub async fn reorder(&self, ids: &[String]) -> Result<()> {
        let request = ApiRequest::post(REORDER_PATH, serde_json::json!({ "bookIds": ids }));
        self.call(request, None).await?;
        Ok(())
    }

    async fn call(&self, request: ApiRequest, id: Option<&str>) -> Result<ApiResponse> {
        let path = request.path.clone();
        let response = self.session.send(request).await.map_err(|e| match e {
            catalog_auth::Error::Network(message) => Error::Network(message),
            other => Error::Auth(other),
        })?;
        debug!(%path, status = response.status, "books api response");
        if response.is_success() {
            return Ok(response);
        }

        let message = response.message();
        Err(match response.status {
            404 => Error::NotFound(id.map(str::to_string).unwrap_or(message)),
            409 if path == REORDER_PATH => Error::ReorderConflict(message),
            409 => Error::Conflict(message),
            400 | 422 => Error::Validation(message),
            status => Error::Http { status, message },
        })
    }
}

impl Reconcile for BooksApi {
    fn reconcile<'a>(
        &'a self,
        order: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.reorder(order))
    }
}

fn book_path(id: &str) -> String {
    format!("{BOOKS_PATH}/{id}")
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Validation(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    response.json().map_err(|e| Error::Http {
        status: response.status,
        message: format!("invalid response body: {e}"),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::book::tests::sample;
    use catalog_auth::{TokenPair, TokenStore};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use crate::collection::CollectionStore;
    use crate::notify::Notifier;
    use crate::reorder::ReorderSync;
    use transport::{Method, Transport, TransportError};

    /// Scripted `/books` backend over a plain `Vec`. Accepts any bearer
    /// token it issued; failures can be injected per path.
    pub(crate) struct BooksBackend {
        books: Mutex<Vec<Book>>,
        failing: Mutex<Vec<(String, u16)>>,
        pub(crate) calls: Mutex<Vec<(Method, String, Option<serde_json::Value>)>>,
        access: String,
    }

    impl BooksBackend {
        pub(crate) fn new(books: Vec<Book>, access: String) -> Self {
            Self {
                books: Mutex::new(books),
                failing: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                access,
            }
        }

        pub(crate) fn fail(&self, path: &str, status: u16) {
            self.failing.lock().unwrap().push((path.to_string(), status));
        }

        pub(crate) fn ids(&self) -> Vec<String> {
            self.books.lock().unwrap().iter().map(|b| b.id.clone()).collect()
        }

        fn handle(&self, request: &ApiRequest) -> ApiResponse {
            let body = request.body.clone().unwrap_or_default();
            let mut books = self.books.lock().unwrap();
            let id = request.path.strip_prefix("/books/").map(str::to_string);

            match (request.method.clone(), request.path.as_str(), id) {
                (Method::GET, BOOKS_PATH, _) => ApiResponse::new(200, serde_json::to_value(&*books).unwrap()),
                (Method::POST, BOOKS_PATH, _) => {
                    let new: NewBook = serde_json::from_value(body).unwrap();
                    let book = new.with_id(format!("srv-{}", books.len() + 1));
                    books.push(book.clone());
                    ApiResponse::new(200, serde_json::to_value(book).unwrap())
                }
                (Method::POST, REORDER_PATH, _) => {
                    let order: Vec<String> = serde_json::from_value(body["bookIds"].clone()).unwrap();
                    books.sort_by_key(|b| order.iter().position(|id| *id == b.id));
                    ApiResponse::new(200, serde_json::json!({"message": "Books reordered"}))
                }
                (method, _, Some(id)) => {
                    let Some(index) = books.iter().position(|b| b.id == id) else {
                        return ApiResponse::new(404, serde_json::json!({"message": "Book not found"}));
                    };
                    match method {
                        Method::GET => ApiResponse::new(200, serde_json::to_value(&books[index]).unwrap()),
                        Method::PUT => {
                            let patch: BookPatch = serde_json::from_value(body).unwrap();
                            books[index] = books[index].patched(&patch);
                            ApiResponse::new(200, serde_json::to_value(&books[index]).unwrap())
                        }
                        Method::DELETE => {
                            books.remove(index);
                            ApiResponse::new(200, serde_json::json!({"message": "Book deleted"}))
                        }
                        _ => ApiResponse::new(405, serde_json::Value::Null),
                    }
                }
                _ => ApiResponse::new(404, serde_json::json!({"message": "Not found"})),
            }
        }
    }

    impl Transport for BooksBackend {
        fn id(&self) -> &str {
            "books-mock"
        }

        fn send<'a>(
            &'a self,
            request: &'a ApiRequest,
        ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push((
                    request.method.clone(),
                    request.path.clone(),
                    request.body.clone(),
                ));
                let bearer = request.bearer.as_ref().map(|t| t.expose().as_str());
                if bearer != Some(self.access.as_str()) {
                    return Ok(ApiResponse::new(401, serde_json::json!({"message": "Unauthorized"})));
                }
                let injected = self
                    .failing
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(path, _)| *path == request.path)
                    .map(|(_, status)| *status);
                if let Some(status) = injected {
                    return Ok(ApiResponse::new(status, serde_json::json!({"message": "injected failure"})));
                }
                Ok(self.handle(request))
            })
        }
    }

    /// A logged-in session over a scripted backend holding `books`.
    pub(crate) async fn connect(books: Vec<Book>) -> (Arc<BooksBackend>, AuthSession) {
        let pair = TokenPair::issue("1", "admin", Duration::from_secs(900), Duration::from_secs(3600)).unwrap();
        let backend = Arc::new(BooksBackend::new(books, pair.access.clone()));
        let tokens = Arc::new(TokenStore::in_memory());
        tokens.set_pair(&pair).await.unwrap();
        let session = AuthSession::new(backend.clone(), tokens).await;
        (backend, session)
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let (backend, session) = connect(vec![sample("Gatsby").with_id("1")]).await;
        let api = BooksApi::new(session);

        assert_eq!(api.list().await.unwrap().len(), 1);
        let created = api.create(&sample("1984")).await.unwrap();
        assert_eq!(created.id, "srv-2");

        let patch = BookPatch {
            rating: Some(3.0),
            ..Default::default()
        };
        assert_eq!(api.update("1", &patch).await.unwrap().rating, Some(3.0));
        assert_eq!(api.get("srv-2").await.unwrap().title, "1984");

        api.delete("1").await.unwrap();
        assert_eq!(backend.ids(), vec!["srv-2".to_string()]);
    }

    #[tokio::test]
    async fn status_mapping() {
        let (backend, session) = connect(vec![sample("Gatsby").with_id("1")]).await;
        let api = BooksApi::new(session);

        assert_eq!(api.get("missing").await.unwrap_err(), Error::NotFound("missing".into()));

        backend.fail(REORDER_PATH, 409);
        let err = api.reorder(&["1".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::ReorderConflict(_)));

        backend.fail(BOOKS_PATH, 400);
        assert!(matches!(api.create(&sample("x")).await, Err(Error::Validation(_))));

        backend.fail("/books/1", 500);
        let err = api.get("1").await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn reorder_posts_book_ids() {
        let books = vec![sample("a").with_id("a"), sample("b").with_id("b")];
        let (backend, session) = connect(books).await;
        let api = BooksApi::new(session);

        api.reconcile(&["b".to_string(), "a".to_string()]).await.unwrap();
        assert_eq!(backend.ids(), vec!["b".to_string(), "a".to_string()]);

        let calls = backend.calls.lock().unwrap().clone();
        let (method, path, body) = calls.last().unwrap();
        assert_eq!(*method, Method::POST);
        assert_eq!(path, REORDER_PATH);
        assert_eq!(body.as_ref().unwrap()["bookIds"], serde_json::json!(["b", "a"]));
    }

    /// Every request fails before reaching a server.
    struct Unreachable;

    impl Transport for Unreachable {
        fn id(&self) -> &str {
            "unreachable"
        }

        fn send<'a>(
            &'a self,
            _request: &'a ApiRequest,
        ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + 'a>> {
            Box::pin(async { Err(TransportError::Connect("refused".into())) })
        }
    }

    #[tokio::test]
    async fn connection_failure_is_network_error_and_rolls_back_reorder() {
        let pair = TokenPair::issue("1", "admin", Duration::from_secs(900), Duration::from_secs(3600)).unwrap();
        let tokens = Arc::new(TokenStore::in_memory());
        tokens.set_pair(&pair).await.unwrap();
        let session = AuthSession::new(Arc::new(Unreachable), tokens).await;
        let api = BooksApi::new(session);

        let err = api.reorder(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {err:?}");

        let store = Arc::new(CollectionStore::with_books(vec![
            sample("a").with_id("a"),
            sample("b").with_id("b"),
            sample("c").with_id("c"),
        ]));
        let (notifier, mut notifications) = Notifier::channel();
        let sync = ReorderSync::new(store.clone(), Arc::new(api), notifier);

        let err = sync.reorder("c", "a").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)), "got {err:?}");
        assert_eq!(store.order().await.ids(), ["a", "b", "c"].map(String::from).as_slice());
        assert!(notifications.try_recv().unwrap().message.starts_with("Failed to save new order"));
        assert!(notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn auth_failure_surfaces_as_auth_error() {
        let (_backend, session) = connect(Vec::new()).await;
        session.logout().await.unwrap();
        let api = BooksApi::new(session);

        let err = api.list().await.unwrap_err();
        assert_eq!(err, Error::Auth(catalog_auth::Error::NoRefreshToken));
    }
}
