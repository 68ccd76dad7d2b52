//! Loan management service

use std::future::Future;

use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    ledger,
    models::loan::{
        BorrowOutcome, BorrowRequest, BorrowerLoans, LoanHistoryQuery, LoanView, ReturnOutcome,
        ReturnRequest,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow copies of a book.
    ///
    /// A borrow that loses the race for the last copies is run once more
    /// before the conflict is reported.
    pub async fn borrow(&self, book_id: Uuid, request: BorrowRequest) -> AppResult<BorrowOutcome> {
        let request = request.trimmed();
        request.validate()?;

        let outcome = retry_on_conflict(|| self.try_borrow(book_id, &request)).await?;

        tracing::info!(
            book_id = %book_id,
            loan_id = %outcome.loan.id,
            borrower = %outcome.loan.borrower(),
            copies = request.copies,
            loan_copies = outcome.loan.copies,
            copies_available = outcome.book.copies_available,
            extended = outcome.extended,
            "Copies borrowed"
        );

        Ok(outcome)
    }

    async fn try_borrow(&self, book_id: Uuid, request: &BorrowRequest) -> AppResult<BorrowOutcome> {
        let book = self.repository.books.get_by_id(book_id).await?;
        ledger::ensure_available(book.copies_available, request.copies)?;

        self.repository
            .loans
            .borrow(book_id, &request.borrower(), request.copies)
            .await?
            .ok_or(AppError::ConcurrentConflict {
                requested: request.copies,
            })
    }

    /// Return copies borrowed by one borrower
    pub async fn return_copies(
        &self,
        book_id: Uuid,
        request: ReturnRequest,
    ) -> AppResult<ReturnOutcome> {
        let request = request.trimmed();
        request.validate()?;

        let outcome = self
            .repository
            .loans
            .return_copies(book_id, &request.borrower(), request.count)
            .await?;

        tracing::info!(
            book_id = %book_id,
            borrower = %request.borrower(),
            copies = outcome.returned,
            loans_closed = outcome.loans.iter().filter(|l| !l.is_active()).count(),
            copies_available = outcome.book.copies_available,
            "Copies returned"
        );

        Ok(outcome)
    }

    /// Stream active loans, optionally for one book
    pub fn stream_active(
        &self,
        book_id: Option<Uuid>,
    ) -> impl Stream<Item = AppResult<LoanView>> + Send + Unpin + '_ {
        self.repository.loans.stream_active(book_id)
    }

    /// Active loans of a book grouped by borrower
    pub async fn active_borrowers(&self, book_id: Uuid) -> AppResult<Vec<BorrowerLoans>> {
        self.repository.books.get_by_id(book_id).await?;

        let loans: Vec<LoanView> = self
            .repository
            .loans
            .stream_active(Some(book_id))
            .collect::<AppResult<Vec<_>>>()
            .await?;

        Ok(ledger::group_by_borrower(loans))
    }

    /// Every loan, active and closed, grouped by borrower
    pub async fn history(&self, query: &LoanHistoryQuery) -> AppResult<Vec<BorrowerLoans>> {
        let loans = self
            .repository
            .loans
            .history(query.book_id, query.borrower_filter())
            .await?;

        Ok(ledger::group_by_borrower(loans))
    }
}

/// Run `op`, and run it once more if it failed with a retryable conflict
pub(crate) async fn retry_on_conflict<T, F, Fut>(mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    match op().await {
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, "Retrying after concurrent conflict");
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_conflict_retried_once() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result: AppResult<i32> = retry_on_conflict(|| async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::ConcurrentConflict { requested: 1 })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_conflict_surfaces() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result: AppResult<()> = retry_on_conflict(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::ConcurrentConflict { requested: 2 })
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::ConcurrentConflict { requested: 2 })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result: AppResult<()> = retry_on_conflict(|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Unavailable {
                requested: 2,
                available: 1,
            })
        })
        .await;

        tokio_test::assert_err!(result);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
