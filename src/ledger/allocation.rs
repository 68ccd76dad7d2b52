//! Borrow availability checks and return allocation across loans

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Borrower, Loan},
};

/// Copies taken off one loan by a return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanReduction {
    pub loan_id: Uuid,
    /// Copies returned against this loan
    pub returned: i32,
    /// Copies left on the loan afterwards
    pub remaining: i32,
}

impl LoanReduction {
    pub fn closes_loan(&self) -> bool {
        self.remaining == 0
    }
}

/// Fail unless `requested` copies can be taken from `available`
pub fn ensure_available(available: i32, requested: i32) -> AppResult<()> {
    if requested < 1 {
        return Err(AppError::Validation(
            "Number of copies to borrow must be at least 1".to_string(),
        ));
    }
    if requested > available {
        return Err(AppError::Unavailable {
            requested,
            available,
        });
    }
    Ok(())
}

/// Spread a return of `requested` copies over a borrower's active loans.
///
/// The most recent borrow is reduced first; older loans are only touched once
/// newer ones are exhausted. Closed loans in `loans` are ignored.
pub fn plan_return(
    loans: &[Loan],
    borrower: &Borrower,
    requested: i32,
) -> AppResult<Vec<LoanReduction>> {
    let mut active: Vec<&Loan> = loans.iter().filter(|l| l.is_active()).collect();

    if active.is_empty() {
        return Err(AppError::NoActiveLoan {
            borrower_name: borrower.name.clone(),
            borrower_phone: borrower.phone.clone(),
        });
    }

    let total_active: i64 = active.iter().map(|l| i64::from(l.copies)).sum();
    if requested < 1 || i64::from(requested) > total_active {
        return Err(AppError::Validation(format!(
            "Copies to return must be between 1 and {}, got {}",
            total_active, requested
        )));
    }

    // Newest first; stable so equal timestamps keep the caller's order
    active.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));

    let mut remaining = requested;
    let mut plan = Vec::new();
    for loan in active {
        if remaining == 0 {
            break;
        }
        let returned = loan.copies.min(remaining);
        remaining -= returned;
        plan.push(LoanReduction {
            loan_id: loan.id,
            returned,
            remaining: loan.copies - returned,
        });
    }

    Ok(plan)
}
