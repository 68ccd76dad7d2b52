//! Repository layer for database operations

pub mod books;
pub mod loans;

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Lock a book row for the rest of the transaction
pub(crate) async fn lock_book(conn: &mut PgConnection, id: Uuid) -> AppResult<Book> {
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
}

/// Copies currently out on active loans of a book
pub(crate) async fn active_copies(conn: &mut PgConnection, book_id: Uuid) -> AppResult<i32> {
    let copies: i32 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(copies), 0)::int FROM loans WHERE book_id = $1 AND returned_at IS NULL",
    )
    .bind(book_id)
    .fetch_one(conn)
    .await?;
    Ok(copies)
}
