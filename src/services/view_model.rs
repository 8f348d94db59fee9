//! Derived display values
//!
//! Pure functions of the dashboard's books and borrow records. Nothing here is
//! cached; inputs are bounded by what one user can see.

use chrono::NaiveDate;

use crate::models::{Book, BorrowRecord};

/// Genre filter value that disables filtering
pub const ALL_GENRES: &str = "All";

pub const DESCRIPTION_PREVIEW_CHARS: usize = 120;
pub const NO_DESCRIPTION: &str = "No description available.";
pub const UNKNOWN_GENRE: &str = "Unknown";
pub const UNKNOWN_YEAR: &str = "N/A";

/// Books whose genre equals `genre` ignoring case, or every book for "All"
pub fn filter_by_genre<'a>(books: &'a [Book], genre: &str) -> Vec<&'a Book> {
    if genre == ALL_GENRES {
        return books.iter().collect();
    }
    books.iter().filter(|b| b.genre_matches(genre)).collect()
}

/// Whole days `reference` is past `due`; never negative
pub fn late_days(due: NaiveDate, reference: NaiveDate) -> u32 {
    (reference - due).num_days().max(0) as u32
}

/// Days late as shown for a record: open records count up to `today`,
/// returned records up to their return date. Early returns show 0.
pub fn days_late(record: &BorrowRecord, today: NaiveDate) -> u32 {
    if record.is_returned() {
        return record
            .return_date
            .map(|returned| late_days(record.due_date, returned))
            .unwrap_or(0);
    }
    late_days(record.due_date, today)
}

/// Signed distance between return date and due date; negative when the book
/// came back early. `None` for records without a return date.
pub fn return_offset_days(record: &BorrowRecord) -> Option<i64> {
    record
        .return_date
        .map(|returned| (returned - record.due_date).num_days())
}

/// Sum of fines over records that are not returned yet
pub fn total_outstanding_fine(records: &[BorrowRecord]) -> f64 {
    records
        .iter()
        .filter(|r| !r.is_returned())
        .map(BorrowRecord::fine)
        .sum()
}

/// Whether the total fine line should be shown at all
pub fn has_outstanding_borrowings(records: &[BorrowRecord]) -> bool {
    records.iter().any(|r| !r.is_returned())
}

pub fn active_borrowings(records: &[BorrowRecord]) -> Vec<&BorrowRecord> {
    records.iter().filter(|r| !r.is_returned()).collect()
}

pub fn borrowing_history(records: &[BorrowRecord]) -> Vec<&BorrowRecord> {
    records.iter().filter(|r| r.is_returned()).collect()
}

pub fn description_preview(book: &Book) -> String {
    match book.description.as_deref() {
        Some(text) if !text.is_empty() => {
            if text.chars().count() > DESCRIPTION_PREVIEW_CHARS {
                let cut: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
                format!("{}...", cut)
            } else {
                text.to_string()
            }
        }
        _ => NO_DESCRIPTION.to_string(),
    }
}

pub fn published_year_label(book: &Book) -> String {
    match book.published_year {
        Some(year) if year != 0 => year.to_string(),
        _ => UNKNOWN_YEAR.to_string(),
    }
}

pub fn genre_label(book: &Book) -> &str {
    match book.genre_name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_GENRE,
    }
}

pub fn fine_label(amount: f64) -> String {
    format!("{}", amount)
}

/// One line of the borrowings or history table
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowingRow {
    pub book_title: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: String,
    pub fine: f64,
    pub days_late: u32,
}

impl BorrowingRow {
    pub fn from_record(record: &BorrowRecord, today: NaiveDate) -> Self {
        Self {
            book_title: record.book_title.clone(),
            borrow_date: record.borrow_date,
            due_date: record.due_date,
            return_date: record.return_date,
            status: record.status.clone().unwrap_or_default(),
            fine: record.fine(),
            days_late: days_late(record, today),
        }
    }
}

pub fn active_rows(records: &[BorrowRecord], today: NaiveDate) -> Vec<BorrowingRow> {
    active_borrowings(records)
        .into_iter()
        .map(|r| BorrowingRow::from_record(r, today))
        .collect()
}

pub fn history_rows(records: &[BorrowRecord], today: NaiveDate) -> Vec<BorrowingRow> {
    borrowing_history(records)
        .into_iter()
        .map(|r| BorrowingRow::from_record(r, today))
        .collect()
}
