//! Book (catalog) endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::{
    error::{AppError, AppResult},
    ledger::Reconciliation,
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        loan::BorrowerLoans,
    },
};

/// One page of books
#[derive(Serialize, ToSchema)]
pub struct BookPage {
    pub books: Vec<Book>,
    /// Number of books matching the query
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub pages: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteBookParams {
    /// Close active loans and delete anyway
    pub force: Option<bool>,
}

/// List books with search and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Books, newest first", body = BookPage)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let (books, total) = state.services.catalog.search_books(&query).await?;
    let window = state.services.catalog.page_window(&query);

    Ok(Json(BookPage {
        books,
        total,
        page: window.page,
        per_page: window.per_page,
        pages: window.pages(total),
    }))
}

/// Add a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.add_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input or stock below copies on loan", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update_book(id, request).await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID"),
        DeleteBookParams
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has copies on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeleteBookParams>,
) -> AppResult<StatusCode> {
    state
        .services
        .catalog
        .delete_book(id, params.force.unwrap_or(false))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrowers currently holding copies of a book
#[utoipa::path(
    get,
    path = "/books/{id}/borrowers",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Active loans grouped by borrower", body = Vec<BorrowerLoans>),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_book_borrowers(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<BorrowerLoans>>> {
    let borrowers = state.services.loans.active_borrowers(id).await?;
    Ok(Json(borrowers))
}

/// Check one book's copy counters against its active loans
#[utoipa::path(
    get,
    path = "/books/{id}/audit",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reconciliation", body = Reconciliation),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn audit_book(
    State(state): State<crate::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Reconciliation>> {
    state
        .services
        .catalog
        .audit(Some(id))
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
}

/// Check every book's copy counters against active loans
#[utoipa::path(
    get,
    path = "/audit",
    tag = "books",
    responses(
        (status = 200, description = "Reconciliation for every book", body = Vec<Reconciliation>)
    )
)]
pub async fn audit_catalog(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<Reconciliation>>> {
    let report = state.services.catalog.audit(None).await?;
    Ok(Json(report))
}
