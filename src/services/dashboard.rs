//! Dashboard state
//!
//! Local copy of the catalog, the genre list and the signed-in user's borrow
//! records. Every fetch takes a sequence number before it is issued and its
//! response is applied only if nothing newer has been applied for that
//! resource. After `unmount` no response touches the state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc, watch};

use super::notifier::HubEvent;
use crate::domain::{CatalogRepository, TransactionRepository};
use crate::models::{Book, BorrowRecord, Genre, Session};

/// Point-in-time copy of the dashboard state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub books: Vec<Book>,
    pub genres: Vec<Genre>,
    pub borrowings: Vec<BorrowRecord>,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct DashboardState {
    books: Vec<Book>,
    genres: Vec<Genre>,
    borrowings: Vec<BorrowRecord>,
    loading: bool,
    books_seq: u64,
    genres_seq: u64,
    borrowings_seq: u64,
}

/// Record `seq` as applied unless something newer already was
fn claim(applied: &mut u64, seq: u64) -> bool {
    if seq <= *applied {
        return false;
    }
    *applied = seq;
    true
}

pub struct Dashboard {
    catalog: Arc<dyn CatalogRepository>,
    transactions: Arc<dyn TransactionRepository>,
    session: Session,
    state: RwLock<DashboardState>,
    next_seq: AtomicU64,
    unmounted: watch::Sender<bool>,
    revision: watch::Sender<u64>,
}

impl Dashboard {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        transactions: Arc<dyn TransactionRepository>,
        session: Session,
    ) -> Self {
        let (unmounted, _) = watch::channel(false);
        let (revision, _) = watch::channel(0);
        Self {
            catalog,
            transactions,
            session,
            state: RwLock::new(DashboardState {
                loading: true,
                ..Default::default()
            }),
            next_seq: AtomicU64::new(0),
            unmounted,
            revision,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Initial load of books, genres and borrow records
    pub async fn mount(&self) {
        tokio::join!(
            self.refresh_books(),
            self.refresh_genres(),
            self.refresh_borrowings()
        );

        self.state.write().await.loading = false;
        self.bump_revision();
    }

    /// Stop applying responses. In-flight requests still complete but their
    /// results are discarded.
    pub fn unmount(&self) {
        self.unmounted.send_replace(true);
    }

    pub fn is_unmounted(&self) -> bool {
        *self.unmounted.borrow()
    }

    /// Bumped every time a response or local mutation changes the state
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.read().await;
        DashboardSnapshot {
            books: state.books.clone(),
            genres: state.genres.clone(),
            borrowings: state.borrowings.clone(),
            loading: state.loading,
        }
    }

    pub async fn book(&self, book_id: i64) -> Option<Book> {
        self.state
            .read()
            .await
            .books
            .iter()
            .find(|b| b.book_id == book_id)
            .cloned()
    }

    /// Refetch what an invalidation event can have changed
    pub async fn refresh_all(&self) {
        tokio::join!(self.refresh_books(), self.refresh_borrowings());
    }

    pub async fn refresh_books(&self) {
        let seq = self.issue_seq();
        let result = self.catalog.fetch_books().await;
        if self.is_unmounted() {
            tracing::debug!("Dashboard unmounted, dropping books response #{}", seq);
            return;
        }

        match result {
            Ok(books) => {
                let mut state = self.state.write().await;
                if !claim(&mut state.books_seq, seq) {
                    tracing::debug!("Dropping stale books response #{}", seq);
                    return;
                }
                state.books = books;
                // The featured list stops "loading" once books arrive, even if
                // the other resources are still in flight
                state.loading = false;
            }
            Err(e) => {
                tracing::error!("Error fetching books: {}", e);
                return;
            }
        }
        self.bump_revision();
    }

    pub async fn refresh_genres(&self) {
        let seq = self.issue_seq();
        let result = self.catalog.fetch_genres().await;
        if self.is_unmounted() {
            tracing::debug!("Dashboard unmounted, dropping genres response #{}", seq);
            return;
        }

        match result {
            Ok(genres) => {
                let mut state = self.state.write().await;
                if !claim(&mut state.genres_seq, seq) {
                    tracing::debug!("Dropping stale genres response #{}", seq);
                    return;
                }
                state.genres = genres;
            }
            Err(e) => {
                tracing::error!("Error fetching genres: {}", e);
                return;
            }
        }
        self.bump_revision();
    }

    pub async fn refresh_borrowings(&self) {
        let seq = self.issue_seq();
        let result = self
            .transactions
            .fetch_borrow_records(&self.session.token)
            .await;
        if self.is_unmounted() {
            tracing::debug!("Dashboard unmounted, dropping borrowings response #{}", seq);
            return;
        }

        match result {
            Ok(records) => {
                let mine: Vec<BorrowRecord> = records
                    .into_iter()
                    .filter(|r| r.user_email == self.session.email)
                    .collect();

                let mut state = self.state.write().await;
                if !claim(&mut state.borrowings_seq, seq) {
                    tracing::debug!("Dropping stale borrowings response #{}", seq);
                    return;
                }
                state.borrowings = mine;
            }
            Err(e) => {
                tracing::error!("Error fetching borrowings: {}", e);
                return;
            }
        }
        self.bump_revision();
    }

    /// Apply a server-confirmed borrow locally: one copy fewer for the book
    /// and the new record appended.
    ///
    /// Claims fresh sequence numbers so fetches issued before the borrow
    /// cannot roll the change back. Returns false if the book was unknown or
    /// already at zero copies (the count is left untouched).
    pub async fn apply_local_borrow(&self, book_id: i64, record: BorrowRecord) -> bool {
        if self.is_unmounted() {
            tracing::debug!("Dashboard unmounted, skipping local borrow of {}", book_id);
            return false;
        }

        let books_seq = self.issue_seq();
        let borrowings_seq = self.issue_seq();

        let decremented = {
            let mut state = self.state.write().await;
            claim(&mut state.books_seq, books_seq);
            claim(&mut state.borrowings_seq, borrowings_seq);

            let decremented = match state.books.iter_mut().find(|b| b.book_id == book_id) {
                Some(book) => book.take_copy(),
                None => false,
            };
            state.borrowings.push(record);
            decremented
        };

        if !decremented {
            tracing::warn!(
                "Book {} borrowed but local copy count not decremented (unknown or already 0)",
                book_id
            );
        }
        self.bump_revision();
        decremented
    }

    /// Refetch on every hub event until unmounted or the event source closes.
    ///
    /// Each event's refetch runs as its own task; out-of-order completions are
    /// sorted out by the sequence numbers.
    pub async fn run_invalidation_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HubEvent>) {
        let mut unmounted = self.unmounted.subscribe();

        loop {
            if *unmounted.borrow() {
                break;
            }

            tokio::select! {
                _ = unmounted.changed() => {}
                event = events.recv() => match event {
                    Some(event) => {
                        tracing::info!("🔄 Refreshing after {}: {}", event.target, event.message);
                        let dashboard = Arc::clone(&self);
                        tokio::spawn(async move { dashboard.refresh_all().await });
                    }
                    None => break,
                },
            }
        }

        tracing::debug!("Invalidation loop stopped");
    }

    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}
