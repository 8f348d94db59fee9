//! Borrowing workflow
//!
//! `Idle -> BookSelected -> ConfirmPending -> Committing -> Idle`, with
//! `ConfirmPending -> BookSelected` on cancel and `Committing -> ConfirmPending`
//! when the server rejects the borrow. While a borrow is committing further
//! confirms are refused.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::dashboard::Dashboard;
use super::notifier::NOTIFY_BOOK_UPDATE;
use crate::domain::{ClientError, TransactionRepository, UpdateBroadcaster};
use crate::models::{Book, BorrowRecord, BorrowRequest, Session};
use crate::utils::dates;

pub const BORROWED_MESSAGE: &str = "A book has been borrowed!";
pub const BORROW_FAILED_ALERT: &str = "Failed to borrow book. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum BorrowStep {
    Idle,
    BookSelected(Book),
    ConfirmPending(Book),
    Committing(Book),
}

impl BorrowStep {
    pub fn book(&self) -> Option<&Book> {
        match self {
            BorrowStep::Idle => None,
            BorrowStep::BookSelected(book)
            | BorrowStep::ConfirmPending(book)
            | BorrowStep::Committing(book) => Some(book),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BorrowStep::Idle => "idle",
            BorrowStep::BookSelected(_) => "book selected",
            BorrowStep::ConfirmPending(_) => "confirm pending",
            BorrowStep::Committing(_) => "committing",
        }
    }
}

struct WorkflowState {
    step: BorrowStep,
    last_alert: Option<String>,
}

pub struct BorrowWorkflow {
    transactions: Arc<dyn TransactionRepository>,
    broadcaster: Arc<dyn UpdateBroadcaster>,
    dashboard: Arc<Dashboard>,
    session: Session,
    loan_period_days: u32,
    state: Mutex<WorkflowState>,
}

impl BorrowWorkflow {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        broadcaster: Arc<dyn UpdateBroadcaster>,
        dashboard: Arc<Dashboard>,
        session: Session,
        loan_period_days: u32,
    ) -> Self {
        Self {
            transactions,
            broadcaster,
            dashboard,
            session,
            loan_period_days,
            state: Mutex::new(WorkflowState {
                step: BorrowStep::Idle,
                last_alert: None,
            }),
        }
    }

    /// Open the details of a book. A missing book is an error, never a panic.
    pub async fn select_book(&self, book: Option<Book>) -> Result<(), ClientError> {
        let book = book.ok_or_else(|| ClientError::InvalidState("No book selected".to_string()))?;

        let mut state = self.state.lock().await;
        if matches!(state.step, BorrowStep::Committing(_)) {
            return Err(ClientError::InvalidState(
                "A borrow is already in progress".to_string(),
            ));
        }
        state.step = BorrowStep::BookSelected(book);
        Ok(())
    }

    pub async fn close_details(&self) {
        let mut state = self.state.lock().await;
        if !matches!(state.step, BorrowStep::Committing(_)) {
            state.step = BorrowStep::Idle;
        }
    }

    /// Ask for confirmation of the selected book
    pub async fn request_confirm(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let book = match &state.step {
            BorrowStep::BookSelected(book) => book.clone(),
            other => {
                return Err(ClientError::InvalidState(format!(
                    "Cannot confirm from {}",
                    other.name()
                )));
            }
        };
        state.step = BorrowStep::ConfirmPending(book);
        Ok(())
    }

    /// Back to the details view, nothing is sent
    pub async fn cancel_confirm(&self) {
        let mut state = self.state.lock().await;
        if let BorrowStep::ConfirmPending(book) = &state.step {
            let book = book.clone();
            state.step = BorrowStep::BookSelected(book);
        }
    }

    /// Confirm the borrow with today's date
    pub async fn confirm(&self) -> Result<BorrowRecord, ClientError> {
        self.confirm_on(dates::today()).await
    }

    /// Submit the borrow for the selected book as of `borrow_date`.
    ///
    /// On success the dashboard is updated locally, other sessions are
    /// notified once, and the workflow returns to idle. On failure the user
    /// stays on the confirmation with an alert and nothing is broadcast.
    pub async fn confirm_on(&self, borrow_date: NaiveDate) -> Result<BorrowRecord, ClientError> {
        let book = {
            let mut state = self.state.lock().await;
            let book = match &state.step {
                BorrowStep::ConfirmPending(book) => book.clone(),
                BorrowStep::Committing(_) => {
                    tracing::warn!("Borrow already in progress, ignoring confirm");
                    return Err(ClientError::InvalidState(
                        "A borrow is already in progress".to_string(),
                    ));
                }
                other => {
                    return Err(ClientError::InvalidState(format!(
                        "Cannot borrow from {}",
                        other.name()
                    )));
                }
            };
            state.step = BorrowStep::Committing(book.clone());
            state.last_alert = None;
            book
        };

        let request = BorrowRequest {
            user_id: self.session.user_id.clone(),
            book_id: book.book_id,
            borrow_date,
            due_date: dates::due_date_for(borrow_date, self.loan_period_days),
        };

        tracing::info!(
            "📚 Borrowing '{}' (book {}) for {}, due {}",
            book.title,
            book.book_id,
            self.session.email,
            request.due_date
        );

        match self
            .transactions
            .submit_borrow(&self.session.token, &request)
            .await
        {
            Ok(mut record) => {
                if record.book_title.is_empty() {
                    record.book_title = book.title.clone();
                }
                if record.user_email.is_empty() {
                    record.user_email = self.session.email.clone();
                }

                self.dashboard
                    .apply_local_borrow(book.book_id, record.clone())
                    .await;
                self.broadcaster
                    .broadcast(NOTIFY_BOOK_UPDATE, BORROWED_MESSAGE);

                self.state.lock().await.step = BorrowStep::Idle;
                tracing::info!("✅ Borrowed '{}'", book.title);
                Ok(record)
            }
            Err(e) => {
                tracing::error!("Error borrowing book {}: {}", book.book_id, e);
                let mut state = self.state.lock().await;
                state.step = BorrowStep::ConfirmPending(book);
                state.last_alert = Some(BORROW_FAILED_ALERT.to_string());
                Err(e)
            }
        }
    }

    pub async fn step(&self) -> BorrowStep {
        self.state.lock().await.step.clone()
    }

    pub async fn is_busy(&self) -> bool {
        matches!(self.state.lock().await.step, BorrowStep::Committing(_))
    }

    pub async fn details_open(&self) -> bool {
        !matches!(self.state.lock().await.step, BorrowStep::Idle)
    }

    pub async fn confirm_open(&self) -> bool {
        matches!(
            self.state.lock().await.step,
            BorrowStep::ConfirmPending(_) | BorrowStep::Committing(_)
        )
    }

    pub async fn selected_book(&self) -> Option<Book> {
        self.state.lock().await.step.book().cloned()
    }

    pub async fn last_alert(&self) -> Option<String> {
        self.state.lock().await.last_alert.clone()
    }
}
