//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::book::Book;

/// One borrower holding some copies of one book, open until fully returned
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub book_id: Uuid,
    pub borrower_name: String,
    pub borrower_phone: String,
    /// Copies still out on this loan
    pub copies: i32,
    /// Copies ever lent on this loan, including returned ones
    pub copies_borrowed: i32,
    /// Last borrow event (refreshed when the loan is extended)
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn borrower(&self) -> Borrower {
        Borrower {
            name: self.borrower_name.clone(),
            phone: self.borrower_phone.clone(),
        }
    }
}

/// Loan joined with the title of its book
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: Loan,
    /// None when the book has been deleted
    pub book_title: Option<String>,
}

/// Borrower identity: loans are matched on the exact (name, phone) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Borrower {
    pub name: String,
    pub phone: String,
}

impl Borrower {
    pub fn new(name: &str, phone: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
        }
    }
}

impl std::fmt::Display for Borrower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.phone)
    }
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    #[validate(length(min = 1, message = "Borrower's name is required"))]
    pub borrower_name: String,
    #[validate(length(min = 1, message = "Borrower's phone is required"))]
    pub borrower_phone: String,
    /// Number of copies to borrow
    #[serde(default)]
    #[validate(range(min = 1, message = "Number of copies to borrow must be at least 1"))]
    pub copies: i32,
}

/// Return request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "Borrower's name is required"))]
    pub borrower_name: String,
    #[validate(length(min = 1, message = "Borrower's phone is required"))]
    pub borrower_phone: String,
    /// Number of copies to return
    #[serde(default)]
    pub count: i32,
}

impl BorrowRequest {
    pub fn trimmed(self) -> Self {
        let borrower = Borrower::new(&self.borrower_name, &self.borrower_phone);
        Self {
            borrower_name: borrower.name,
            borrower_phone: borrower.phone,
            ..self
        }
    }

    pub fn borrower(&self) -> Borrower {
        Borrower::new(&self.borrower_name, &self.borrower_phone)
    }
}

impl ReturnRequest {
    pub fn trimmed(self) -> Self {
        let borrower = Borrower::new(&self.borrower_name, &self.borrower_phone);
        Self {
            borrower_name: borrower.name,
            borrower_phone: borrower.phone,
            ..self
        }
    }

    pub fn borrower(&self) -> Borrower {
        Borrower::new(&self.borrower_name, &self.borrower_phone)
    }
}

/// Result of a successful borrow
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowOutcome {
    pub book: Book,
    pub loan: Loan,
    /// True when an existing active loan was extended instead of created
    pub extended: bool,
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOutcome {
    pub book: Book,
    /// Loans touched by the return, newest first
    pub loans: Vec<Loan>,
    pub returned: i32,
}

/// All loans of one borrower, used for history and borrower selection
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerLoans {
    pub borrower_name: String,
    pub borrower_phone: String,
    /// Copies ever borrowed across the loans
    pub total_copies: i64,
    /// Copies still out
    pub active_copies: i64,
    /// Newest first
    pub loans: Vec<LoanView>,
}

/// Loan history query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanHistoryQuery {
    pub book_id: Option<Uuid>,
    /// Case-insensitive substring over borrower name or phone
    pub q: Option<String>,
}

impl LoanHistoryQuery {
    pub fn borrower_filter(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Active loans query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ActiveLoansQuery {
    pub book_id: Option<Uuid>,
}
