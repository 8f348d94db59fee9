use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::dates::{wire_date, wire_date_opt};
use crate::utils::wire::null_as_default;

pub const STATUS_BORROWED: &str = "borrowed";
pub const STATUS_RETURNED: &str = "returned";

/// One user's checkout of one book copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_email: String,
    pub book_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub book_title: String,
    #[serde(with = "wire_date")]
    pub borrow_date: NaiveDate,
    #[serde(with = "wire_date")]
    pub due_date: NaiveDate,
    #[serde(default, with = "wire_date_opt")]
    pub return_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>, // 'borrowed', 'returned', or other server values
    #[serde(default)]
    pub fine_amount: Option<f64>,
}

impl BorrowRecord {
    /// Record implied by a successful borrow request whose response carried no
    /// usable body
    pub fn from_request(request: &BorrowRequest) -> Self {
        Self {
            transaction_id: 0,
            user_email: String::new(),
            book_id: request.book_id,
            book_title: String::new(),
            borrow_date: request.borrow_date,
            due_date: request.due_date,
            return_date: None,
            status: Some(STATUS_BORROWED.to_string()),
            fine_amount: None,
        }
    }

    pub fn is_returned(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(STATUS_RETURNED))
    }

    /// Fine owed on this record; missing means nothing owed
    pub fn fine(&self) -> f64 {
        self.fine_amount.unwrap_or(0.0)
    }
}

/// Body of `POST /api/borrowtransaction/borrow`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub user_id: String,
    pub book_id: i64,
    #[serde(with = "wire_date")]
    pub borrow_date: NaiveDate,
    #[serde(with = "wire_date")]
    pub due_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_record_from_server() {
        let record: BorrowRecord = serde_json::from_value(json!({
            "transactionId": 12,
            "userEmail": "dummy@gmail.com",
            "bookId": 4,
            "bookTitle": "Dune",
            "borrowDate": "2024-01-01",
            "dueDate": "2024-01-08T00:00:00",
            "returnDate": null,
            "status": "Borrowed",
            "fineAmount": null
        }))
        .unwrap();

        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(record.return_date, None);
        assert!(!record.is_returned());
        assert_eq!(record.fine(), 0.0);
    }

    #[test]
    fn test_returned_status_is_case_insensitive() {
        let record: BorrowRecord = serde_json::from_value(json!({
            "bookId": 4,
            "borrowDate": "2024-01-01",
            "dueDate": "2024-01-08",
            "returnDate": "2024-01-10T16:45:00",
            "status": "RETURNED",
            "fineAmount": 20.0
        }))
        .unwrap();

        assert!(record.is_returned());
        assert_eq!(
            record.return_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
        );
        assert_eq!(record.fine(), 20.0);
    }

    #[test]
    fn test_missing_status_is_not_returned() {
        let record: BorrowRecord = serde_json::from_value(json!({
            "bookId": 4,
            "borrowDate": "2024-01-01",
            "dueDate": "2024-01-08"
        }))
        .unwrap();
        assert!(!record.is_returned());
        assert_eq!(record.user_email, "");
    }

    #[test]
    fn test_null_columns_are_defaulted() {
        let record: BorrowRecord = serde_json::from_value(json!({
            "transactionId": null,
            "userEmail": null,
            "bookId": 4,
            "bookTitle": null,
            "borrowDate": "2024-01-01",
            "dueDate": "2024-01-08",
            "returnDate": null,
            "status": null,
            "fineAmount": null
        }))
        .unwrap();
        assert_eq!(record.transaction_id, 0);
        assert_eq!(record.user_email, "");
        assert_eq!(record.book_title, "");
        assert!(!record.is_returned());
    }

    #[test]
    fn test_invalid_due_date_is_rejected() {
        let result: Result<BorrowRecord, _> = serde_json::from_value(json!({
            "bookId": 4,
            "borrowDate": "2024-01-01",
            "dueDate": "soon"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_borrow_request_wire_format() {
        let request = BorrowRequest {
            user_id: "42".to_string(),
            book_id: 7,
            borrow_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "userId": "42",
                "bookId": 7,
                "borrowDate": "2024-01-01",
                "dueDate": "2024-01-08"
            })
        );
    }
}
