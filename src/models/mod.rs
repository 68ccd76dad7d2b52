//! Data models for Libris

pub mod book;
pub mod loan;

// Re-export commonly used types
pub use book::{Book, BookQuery, CreateBook, NewBook, UpdateBook};
pub use loan::{
    Borrower, BorrowerLoans, BorrowOutcome, BorrowRequest, Loan, LoanView, ReturnOutcome,
    ReturnRequest,
};
