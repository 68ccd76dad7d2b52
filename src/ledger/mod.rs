//! Loan accounting rules.
//!
//! Pure functions with no I/O: the repository runs them inside its
//! transactions and the services use them for read-side projections.

pub mod allocation;
pub mod history;
pub mod reconcile;

pub use allocation::{ensure_available, plan_return, LoanReduction};
pub use history::group_by_borrower;
pub use reconcile::{resolve_stock, Reconciliation, Stock};
