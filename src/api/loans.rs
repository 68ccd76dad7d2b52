//! Borrow, return and loan ledger endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tokio_stream::StreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::{
    error::AppResult,
    models::{
        book::Book,
        loan::{
            ActiveLoansQuery, BorrowRequest, BorrowerLoans, Loan, LoanHistoryQuery, LoanView,
            ReturnRequest,
        },
    },
};

/// Borrow response
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub success: bool,
    pub message: String,
    pub book: Book,
    pub loan: Loan,
    /// True when an existing loan was extended
    pub extended: bool,
}

/// Return response
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResponse {
    pub success: bool,
    pub message: String,
    pub book: Book,
    /// Loans reduced by the return, newest first
    pub loans: Vec<Loan>,
}

/// Borrow copies of a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Copies borrowed", body = BorrowResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Not enough copies available", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    let outcome = state.services.loans.borrow(book_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            success: true,
            message: "Book borrowed successfully".to_string(),
            book: outcome.book,
            loan: outcome.loan,
            extended: outcome.extended,
        }),
    ))
}

/// Return copies of a book
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Copies returned", body = ReturnResponse),
        (status = 400, description = "Count outside what the borrower holds", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Borrower has no active loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ReturnRequest>,
) -> AppResult<Json<ReturnResponse>> {
    let outcome = state.services.loans.return_copies(book_id, request).await?;

    Ok(Json(ReturnResponse {
        success: true,
        message: format!("Returned {} copies", outcome.returned),
        book: outcome.book,
        loans: outcome.loans,
    }))
}

/// Active loans, optionally for one book
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    params(ActiveLoansQuery),
    responses(
        (status = 200, description = "Active loans, newest first", body = Vec<LoanView>)
    )
)]
pub async fn list_active_loans(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<ActiveLoansQuery>,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state
        .services
        .loans
        .stream_active(query.book_id)
        .collect::<AppResult<Vec<_>>>()
        .await?;
    Ok(Json(loans))
}

/// Loan history grouped by borrower
#[utoipa::path(
    get,
    path = "/loans/history",
    tag = "loans",
    params(LoanHistoryQuery),
    responses(
        (status = 200, description = "All loans grouped by borrower", body = Vec<BorrowerLoans>)
    )
)]
pub async fn loan_history(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<LoanHistoryQuery>,
) -> AppResult<Json<Vec<BorrowerLoans>>> {
    let history = state.services.loans.history(&query).await?;
    Ok(Json(history))
}
