//! Stock adjustments and the copy-count invariant
//!
//! For every book: `copies_available >= 0` and
//! `copies_available + active loan copies == total_copies`.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

/// Shelf and owned counts to write on a book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stock {
    pub copies_available: i32,
    pub total_copies: i32,
}

/// Work out the new stock for a catalog edit, given the copies on loan.
///
/// Returns `None` when the edit does not touch stock.
pub fn resolve_stock(
    active: i32,
    copies_available: Option<i32>,
    total_copies: Option<i32>,
) -> AppResult<Option<Stock>> {
    let too_many = |available: i32| {
        AppError::Validation(format!(
            "Copies available ({}) plus copies on loan ({}) is too large",
            available, active
        ))
    };

    let stock = match (copies_available, total_copies) {
        (None, None) => return Ok(None),
        (Some(available), None) => Stock {
            copies_available: available,
            total_copies: available
                .checked_add(active)
                .ok_or_else(|| too_many(available))?,
        },
        (None, Some(total)) => Stock {
            copies_available: total.checked_sub(active).ok_or_else(|| {
                AppError::Validation(format!(
                    "Total copies ({}) cannot be below copies on loan ({})",
                    total, active
                ))
            })?,
            total_copies: total,
        },
        (Some(available), Some(total)) => {
            let owned = available
                .checked_add(active)
                .ok_or_else(|| too_many(available))?;
            if owned != total {
                return Err(AppError::Validation(format!(
                    "Total copies ({}) must equal copies available ({}) plus copies on loan ({})",
                    total, available, active
                )));
            }
            Stock {
                copies_available: available,
                total_copies: total,
            }
        }
    };

    if stock.copies_available < 0 {
        return Err(AppError::Validation(format!(
            "Total copies ({}) cannot be below copies on loan ({})",
            stock.total_copies, active
        )));
    }

    Ok(Some(stock))
}

/// Invariant check for one book
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub book_id: Uuid,
    pub title: String,
    pub copies_available: i32,
    pub total_copies: i32,
    /// Sum of copies over the book's active loans
    pub active_copies: i64,
    /// total - available - active; zero when consistent
    pub discrepancy: i64,
    pub consistent: bool,
}

impl Reconciliation {
    pub fn check(book: &Book, active_copies: i64) -> Self {
        let discrepancy =
            i64::from(book.total_copies) - i64::from(book.copies_available) - active_copies;
        Self {
            book_id: book.id,
            title: book.title.clone(),
            copies_available: book.copies_available,
            total_copies: book.total_copies,
            active_copies,
            discrepancy,
            consistent: discrepancy == 0 && book.copies_available >= 0,
        }
    }
}
