//! Catalog management service

use tokio_stream::Stream;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::CatalogConfig,
    error::AppResult,
    ledger::Reconciliation,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

/// Resolved pagination for a book listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl PageWindow {
    /// Pages start at 1; an offset past `i64::MAX` saturates and yields an empty page
    pub fn new(page: Option<i64>, per_page: i64) -> Self {
        let page = page.unwrap_or(1).max(1);
        Self {
            page,
            per_page,
            offset: (page - 1).saturating_mul(per_page),
        }
    }

    /// Number of pages needed for `total` rows
    pub fn pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, config: CatalogConfig) -> Self {
        Self { repository, config }
    }

    /// Add a book to the catalog
    pub async fn add_book(&self, request: CreateBook) -> AppResult<Book> {
        let new_book = request.into_new_book()?;
        let book = self.repository.books.create(&new_book).await?;
        tracing::info!(
            book_id = %book.id,
            title = %book.title,
            copies = book.copies_available,
            "Book added"
        );
        Ok(book)
    }

    /// Get book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// One page of books plus the total number of matches
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let window = self.page_window(query);

        self.repository
            .books
            .search(query.filter(), query.genre(), window.per_page, window.offset)
            .await
    }

    /// Page, page size and row offset actually used for a query
    pub fn page_window(&self, query: &BookQuery) -> PageWindow {
        PageWindow::new(query.page, self.config.page_size(query.per_page))
    }

    /// Stream every book matching the query, newest first
    pub fn stream_books(
        &self,
        query: &BookQuery,
    ) -> impl Stream<Item = AppResult<Book>> + Send + Unpin + '_ {
        self.repository.books.stream(
            query.filter().map(str::to_string),
            query.genre().map(str::to_string),
        )
    }

    /// Update an existing book
    pub async fn update_book(&self, id: Uuid, request: UpdateBook) -> AppResult<Book> {
        let request = request.trimmed();
        request.validate()?;

        let book = self.repository.books.update(id, &request).await?;
        tracing::info!(
            book_id = %book.id,
            copies_available = book.copies_available,
            total_copies = book.total_copies,
            "Book updated"
        );
        Ok(book)
    }

    /// Delete a book; see `BooksRepository::delete` for the loan policy
    pub async fn delete_book(&self, id: Uuid, force: bool) -> AppResult<()> {
        let closed = self.repository.books.delete(id, force).await?;
        if closed > 0 {
            tracing::warn!(book_id = %id, closed_loans = closed, "Book deleted with active loans closed");
        } else {
            tracing::info!(book_id = %id, "Book deleted");
        }
        Ok(())
    }

    /// Check the copy-count invariant for one book or the whole catalog
    pub async fn audit(&self, book_id: Option<Uuid>) -> AppResult<Vec<Reconciliation>> {
        let report = self.repository.books.reconcile(book_id).await?;
        for entry in report.iter().filter(|r| !r.consistent) {
            tracing::warn!(
                book_id = %entry.book_id,
                discrepancy = entry.discrepancy,
                "Copy counters out of step with active loans"
            );
        }
        Ok(report)
    }
}
