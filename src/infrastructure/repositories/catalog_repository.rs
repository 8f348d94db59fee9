//! HTTP implementation of CatalogRepository

use async_trait::async_trait;

use crate::domain::{CatalogRepository, ClientError};
use crate::infrastructure::http::ApiClient;
use crate::models::{Book, Genre};

pub const BOOKS_PATH: &str = "/api/Book";
pub const GENRES_PATH: &str = "/api/Genre";

/// Unauthenticated catalog reads against the library API
pub struct HttpCatalogRepository {
    api: ApiClient,
}

impl HttpCatalogRepository {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CatalogRepository for HttpCatalogRepository {
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError> {
        let books: Vec<Book> = self.api.get_json(BOOKS_PATH, None).await?;
        tracing::debug!("Fetched {} books", books.len());
        Ok(books)
    }

    async fn fetch_genres(&self) -> Result<Vec<Genre>, ClientError> {
        self.api.get_json(GENRES_PATH, None).await
    }
}
