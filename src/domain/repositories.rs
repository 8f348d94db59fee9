//! Remote data access traits
//!
//! These traits define the contract the dashboard and the borrowing workflow
//! rely on. HTTP implementations live in the infrastructure layer.

use async_trait::async_trait;

use super::ClientError;
use crate::models::{Book, BorrowRecord, BorrowRequest, Genre};

/// Read-only access to the book catalog
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Fetch every book in the catalog
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError>;

    /// Fetch the genre reference list
    async fn fetch_genres(&self) -> Result<Vec<Genre>, ClientError>;
}

/// Borrow transactions
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Fetch borrow records for all users. The server does not scope this
    /// query; callers filter by the session's email.
    async fn fetch_borrow_records(&self, token: &str) -> Result<Vec<BorrowRecord>, ClientError>;

    /// Create a borrow record on the server
    async fn submit_borrow(
        &self,
        token: &str,
        request: &BorrowRequest,
    ) -> Result<BorrowRecord, ClientError>;
}

/// Fan-out of local mutations to other connected sessions.
///
/// Implementations must not fail loudly: when the channel is not usable they
/// log and drop the message.
pub trait UpdateBroadcaster: Send + Sync {
    fn broadcast(&self, method: &str, message: &str);
}
