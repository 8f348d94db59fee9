//! In-memory repositories for service tests

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::domain::{CatalogRepository, ClientError, TransactionRepository, UpdateBroadcaster};
use crate::models::{Book, BorrowRecord, BorrowRequest, Genre, Role, Session};

pub fn session() -> Session {
    Session {
        user_id: "42".to_string(),
        token: "token".to_string(),
        email: "dummy@gmail.com".to_string(),
        role: Role::User,
    }
}

pub fn book(id: i64, copies: i32) -> Book {
    Book {
        book_id: id,
        title: format!("Book {}", id),
        author_name: Some("Frank Herbert".to_string()),
        genre_name: Some("Fantasy".to_string()),
        cover_image_url: None,
        published_year: Some(1965),
        isbn: None,
        description: None,
        available_copies: copies,
    }
}

pub fn record(book_id: i64, email: &str) -> BorrowRecord {
    BorrowRecord {
        transaction_id: book_id * 10,
        user_email: email.to_string(),
        book_id,
        book_title: format!("Book {}", book_id),
        borrow_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        return_date: None,
        status: Some("borrowed".to_string()),
        fine_amount: None,
    }
}

type Gate<T> = oneshot::Sender<T>;

/// Catalog that either answers from memory or parks each `fetch_books` call
/// until the test releases it through [`FakeCatalog::next_gate`]
pub struct FakeCatalog {
    books: StdMutex<Vec<Book>>,
    fail_next: StdMutex<bool>,
    gates_tx: Option<mpsc::UnboundedSender<Gate<Vec<Book>>>>,
    gates_rx: Mutex<Option<mpsc::UnboundedReceiver<Gate<Vec<Book>>>>>,
}

impl FakeCatalog {
    pub fn with_books(books: Vec<Book>) -> Self {
        Self {
            books: StdMutex::new(books),
            fail_next: StdMutex::new(false),
            gates_tx: None,
            gates_rx: Mutex::new(None),
        }
    }

    pub fn gated() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            books: StdMutex::new(vec![]),
            fail_next: StdMutex::new(false),
            gates_tx: Some(tx),
            gates_rx: Mutex::new(Some(rx)),
        }
    }

    pub fn set_books(&self, books: Vec<Book>) {
        *self.books.lock().unwrap() = books;
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Wait for the next parked `fetch_books` call
    pub async fn next_gate(&self) -> Gate<Vec<Book>> {
        let mut rx = self.gates_rx.lock().await;
        rx.as_mut().unwrap().recv().await.unwrap()
    }
}

#[async_trait]
impl CatalogRepository for FakeCatalog {
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(ClientError::Status(500));
        }

        if let Some(gates) = &self.gates_tx {
            let (tx, rx) = oneshot::channel();
            gates.send(tx).unwrap();
            return rx.await.map_err(|_| ClientError::Network("gate dropped".to_string()));
        }

        Ok(self.books.lock().unwrap().clone())
    }

    async fn fetch_genres(&self) -> Result<Vec<Genre>, ClientError> {
        Ok(vec![Genre {
            genre_id: 1,
            name: "Fantasy".to_string(),
        }])
    }
}

/// Transaction store that records every borrow submitted to it
pub struct FakeTransactions {
    records: StdMutex<Vec<BorrowRecord>>,
    submitted: StdMutex<Vec<BorrowRequest>>,
    submit_error: StdMutex<Option<ClientError>>,
    submit_gates_tx: Option<mpsc::UnboundedSender<Gate<()>>>,
    submit_gates_rx: Mutex<Option<mpsc::UnboundedReceiver<Gate<()>>>>,
}

impl FakeTransactions {
    pub fn with_records(records: Vec<BorrowRecord>) -> Self {
        Self {
            records: StdMutex::new(records),
            submitted: StdMutex::new(vec![]),
            submit_error: StdMutex::new(None),
            submit_gates_tx: None,
            submit_gates_rx: Mutex::new(None),
        }
    }

    /// Every `submit_borrow` waits for [`FakeTransactions::next_submit_gate`]
    pub fn gated_submits() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            submit_gates_tx: Some(tx),
            submit_gates_rx: Mutex::new(Some(rx)),
            ..Self::with_records(vec![])
        }
    }

    pub fn set_records(&self, records: Vec<BorrowRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn fail_submits_with(&self, error: ClientError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    pub fn submitted(&self) -> Vec<BorrowRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub async fn next_submit_gate(&self) -> Gate<()> {
        let mut rx = self.submit_gates_rx.lock().await;
        rx.as_mut().unwrap().recv().await.unwrap()
    }
}

#[async_trait]
impl TransactionRepository for FakeTransactions {
    async fn fetch_borrow_records(&self, _token: &str) -> Result<Vec<BorrowRecord>, ClientError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn submit_borrow(
        &self,
        _token: &str,
        request: &BorrowRequest,
    ) -> Result<BorrowRecord, ClientError> {
        self.submitted.lock().unwrap().push(request.clone());

        if let Some(gates) = &self.submit_gates_tx {
            let (tx, rx) = oneshot::channel();
            gates.send(tx).unwrap();
            rx.await.map_err(|_| ClientError::Network("gate dropped".to_string()))?;
        }

        if let Some(error) = self.submit_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(BorrowRecord::from_request(request))
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: StdMutex<Vec<(String, String)>>,
}

impl RecordingBroadcaster {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl UpdateBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, method: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((method.to_string(), message.to_string()));
    }
}
