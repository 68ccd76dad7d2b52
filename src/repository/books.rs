//! Books repository for database operations

use chrono::Utc;
use sqlx::{FromRow, Pool, Postgres};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use super::{active_copies, lock_book};
use crate::{
    error::{AppError, AppResult},
    ledger::{self, Reconciliation},
    models::book::{like_pattern, Book, NewBook, UpdateBook},
};

const LIST_BOOKS: &str = r#"
    SELECT * FROM books
    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR genre ILIKE $1)
      AND ($2::text IS NULL OR genre = $2)
    ORDER BY created_at DESC, id
"#;

const PAGE_BOOKS: &str = r#"
    SELECT * FROM books
    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR genre ILIKE $1)
      AND ($2::text IS NULL OR genre = $2)
    ORDER BY created_at DESC, id
    LIMIT $3 OFFSET $4
"#;

const COUNT_BOOKS: &str = r#"
    SELECT COUNT(*) FROM books
    WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR genre ILIKE $1)
      AND ($2::text IS NULL OR genre = $2)
"#;

#[derive(FromRow)]
struct BookActivity {
    #[sqlx(flatten)]
    book: Book,
    active_copies: i64,
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Insert a new book; all of its copies start on the shelf
    pub async fn create(&self, book: &NewBook) -> AppResult<Book> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, genre, year, copies_available, total_copies,
                               cover_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.year)
        .bind(book.copies_available)
        .bind(&book.cover_ref)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// One page of books matching the filters, with the total match count
    pub async fn search(
        &self,
        filter: Option<&str>,
        genre: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let pattern = filter.map(like_pattern);

        let books = sqlx::query_as::<_, Book>(PAGE_BOOKS)
            .bind(&pattern)
            .bind(genre)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(COUNT_BOOKS)
            .bind(&pattern)
            .bind(genre)
            .fetch_one(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Lazily stream every matching book, newest first.
    ///
    /// Each call runs the query again, so the sequence can be restarted.
    pub fn stream(
        &self,
        filter: Option<String>,
        genre: Option<String>,
    ) -> impl Stream<Item = AppResult<Book>> + Send + Unpin + '_ {
        sqlx::query_as::<_, Book>(LIST_BOOKS)
            .bind(filter.as_deref().map(like_pattern))
            .bind(genre)
            .fetch(&self.pool)
            .map(|row| row.map_err(AppError::from))
    }

    /// Update a book.
    ///
    /// Stock edits are resolved against the copies currently on loan while the
    /// book row is locked.
    pub async fn update(&self, id: Uuid, data: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        lock_book(&mut tx, id).await?;

        let stock = if data.touches_stock() {
            let active = active_copies(&mut tx, id).await?;
            ledger::resolve_stock(active, data.copies_available, data.total_copies)?
        } else {
            None
        };

        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($present:expr, $name:expr) => {
                if $present {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.title.is_some(), "title");
        add_field!(data.author.is_some(), "author");
        add_field!(data.genre.is_some(), "genre");
        add_field!(data.year.is_some(), "year");
        add_field!(data.cover_ref.is_some(), "cover_ref");
        add_field!(stock.is_some(), "copies_available");
        add_field!(stock.is_some(), "total_copies");

        let query = format!(
            "UPDATE books SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Book>(&query).bind(Utc::now());

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.title);
        bind_field!(data.author);
        bind_field!(data.genre);
        bind_field!(data.year);
        bind_field!(data.cover_ref);
        if let Some(stock) = stock {
            builder = builder
                .bind(stock.copies_available)
                .bind(stock.total_copies);
        }

        let book = builder.bind(id).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(book)
    }

    /// Delete a book.
    ///
    /// Refused while copies are on loan unless `force` is set, in which case
    /// the active loans are closed first. Returns the number of loans closed.
    pub async fn delete(&self, id: Uuid, force: bool) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        lock_book(&mut tx, id).await?;
        let on_loan = active_copies(&mut tx, id).await?;

        if on_loan > 0 && !force {
            return Err(AppError::Conflict(format!(
                "Book {} has {} copies on loan; resend with force=true to close those loans and delete it",
                id, on_loan
            )));
        }

        let closed = sqlx::query(
            "UPDATE loans SET copies = 0, returned_at = $1 WHERE book_id = $2 AND returned_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(closed)
    }

    /// Compare every book's counters with its active loans
    pub async fn reconcile(&self, book_id: Option<Uuid>) -> AppResult<Vec<Reconciliation>> {
        let rows = sqlx::query_as::<_, BookActivity>(
            r#"
            SELECT b.*,
                   COALESCE(SUM(l.copies) FILTER (WHERE l.returned_at IS NULL), 0)::bigint
                       AS active_copies
            FROM books b
            LEFT JOIN loans l ON l.book_id = b.id
            WHERE ($1::uuid IS NULL OR b.id = $1)
            GROUP BY b.id
            ORDER BY b.title, b.id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        if let (Some(id), true) = (book_id, rows.is_empty()) {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        Ok(rows
            .iter()
            .map(|row| Reconciliation::check(&row.book, row.active_copies))
            .collect())
    }
}
