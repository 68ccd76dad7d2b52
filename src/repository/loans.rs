//! Loans repository for database operations.
//!
//! Borrow and return touch both the book's copy counter and the loan rows;
//! each runs in a single transaction so no partial state is ever committed.

use chrono::Utc;
use sqlx::{Pool, Postgres};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use super::lock_book;
use crate::{
    error::{AppError, AppResult},
    ledger,
    models::{
        book::{like_pattern, Book},
        loan::{Borrower, BorrowOutcome, Loan, LoanView, ReturnOutcome},
    },
};

const ACTIVE_LOANS: &str = r#"
    SELECT l.*, b.title AS book_title
    FROM loans l
    LEFT JOIN books b ON b.id = l.book_id
    WHERE l.returned_at IS NULL
      AND ($1::uuid IS NULL OR l.book_id = $1)
    ORDER BY l.borrowed_at DESC, l.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Take `copies` off the shelf and record them against the borrower.
    ///
    /// The shelf count is decremented with a conditional update, so two
    /// concurrent borrows can never both succeed against the same copies.
    /// Returns `None` when the book no longer has enough copies at apply time.
    /// An active loan for the same borrower is extended rather than duplicated.
    pub async fn borrow(
        &self,
        book_id: Uuid,
        borrower: &Borrower,
        copies: i32,
    ) -> AppResult<Option<BorrowOutcome>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET copies_available = copies_available - $1, updated_at = $2
            WHERE id = $3 AND copies_available >= $1
            RETURNING *
            "#,
        )
        .bind(copies)
        .bind(now)
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(book) = book else {
            // Dropping the transaction rolls it back
            return Ok(None);
        };

        let existing = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE book_id = $1 AND borrower_name = $2 AND borrower_phone = $3
              AND returned_at IS NULL
            ORDER BY borrowed_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .bind(&borrower.name)
        .bind(&borrower.phone)
        .fetch_optional(&mut *tx)
        .await?;

        let extended = existing.is_some();
        let loan = match existing {
            Some(loan) => {
                sqlx::query_as::<_, Loan>(
                    r#"
                    UPDATE loans
                    SET copies = copies + $1, copies_borrowed = copies_borrowed + $1,
                        borrowed_at = $2
                    WHERE id = $3
                    RETURNING *
                    "#,
                )
                .bind(copies)
                .bind(now)
                .bind(loan.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, Loan>(
                    r#"
                    INSERT INTO loans (id, book_id, borrower_name, borrower_phone,
                                       copies, copies_borrowed, borrowed_at)
                    VALUES ($1, $2, $3, $4, $5, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(book_id)
                .bind(&borrower.name)
                .bind(&borrower.phone)
                .bind(copies)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(Some(BorrowOutcome {
            book,
            loan,
            extended,
        }))
    }

    /// Return `count` copies from the borrower's active loans, newest loan first
    pub async fn return_copies(
        &self,
        book_id: Uuid,
        borrower: &Borrower,
        count: i32,
    ) -> AppResult<ReturnOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        lock_book(&mut tx, book_id).await?;

        let active = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE book_id = $1 AND borrower_name = $2 AND borrower_phone = $3
              AND returned_at IS NULL
            ORDER BY borrowed_at DESC
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .bind(&borrower.name)
        .bind(&borrower.phone)
        .fetch_all(&mut *tx)
        .await?;

        let plan = ledger::plan_return(&active, borrower, count)?;

        let mut loans = Vec::with_capacity(plan.len());
        for reduction in &plan {
            let loan = sqlx::query_as::<_, Loan>(
                "UPDATE loans SET copies = $1, returned_at = $2 WHERE id = $3 RETURNING *",
            )
            .bind(reduction.remaining)
            .bind(reduction.closes_loan().then_some(now))
            .bind(reduction.loan_id)
            .fetch_one(&mut *tx)
            .await?;
            loans.push(loan);
        }

        // The shelf gets back exactly what the caller returned
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET copies_available = copies_available + $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(count)
        .bind(now)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReturnOutcome {
            book,
            loans,
            returned: count,
        })
    }

    /// Lazily stream active loans, optionally for one book, newest first
    pub fn stream_active(
        &self,
        book_id: Option<Uuid>,
    ) -> impl Stream<Item = AppResult<LoanView>> + Send + Unpin + '_ {
        sqlx::query_as::<_, LoanView>(ACTIVE_LOANS)
            .bind(book_id)
            .fetch(&self.pool)
            .map(|row| row.map_err(AppError::from))
    }

    /// All loans, active and closed, matching the filters
    pub async fn history(
        &self,
        book_id: Option<Uuid>,
        borrower_query: Option<&str>,
    ) -> AppResult<Vec<LoanView>> {
        let loans = sqlx::query_as::<_, LoanView>(
            r#"
            SELECT l.*, b.title AS book_title
            FROM loans l
            LEFT JOIN books b ON b.id = l.book_id
            WHERE ($1::uuid IS NULL OR l.book_id = $1)
              AND ($2::text IS NULL OR l.borrower_name ILIKE $2 OR l.borrower_phone ILIKE $2)
            ORDER BY l.borrowed_at DESC, l.id
            "#,
        )
        .bind(book_id)
        .bind(borrower_query.map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
