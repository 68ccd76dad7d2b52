//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const DEFAULT_GENRE: &str = "General";

/// Book record as stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    /// Publication year
    pub year: i32,
    /// Copies on the shelf right now
    pub copies_available: i32,
    /// Copies owned by the library, on the shelf or on loan
    pub total_copies: i32,
    /// Reference (URL or path) to a cover image
    pub cover_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Copies that should currently be out on loan
    pub fn copies_on_loan(&self) -> i32 {
        self.total_copies - self.copies_available
    }
}

/// Create book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(
        required(message = "Title is required"),
        length(min = 1, message = "Title is required")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "Author is required"),
        length(min = 1, message = "Author is required")
    )]
    pub author: Option<String>,
    pub genre: Option<String>,
    #[validate(
        required(message = "Year is required"),
        range(min = 0, message = "Year must be a positive integer")
    )]
    pub year: Option<i32>,
    /// Defaults to 1
    #[validate(range(min = 0, message = "Copies available must be 0 or more"))]
    pub copies_available: Option<i32>,
    pub cover_ref: Option<String>,
}

/// A validated book ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year: i32,
    pub copies_available: i32,
    pub cover_ref: Option<String>,
}

impl CreateBook {
    /// Trim text fields, validate and apply defaults
    pub fn into_new_book(self) -> AppResult<NewBook> {
        let request = CreateBook {
            title: self.title.map(|t| t.trim().to_string()),
            author: self.author.map(|a| a.trim().to_string()),
            genre: self
                .genre
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
            cover_ref: self.cover_ref.filter(|c| !c.trim().is_empty()),
            ..self
        };
        request.validate()?;

        let missing = |field: &str| AppError::Validation(format!("{} is required", field));

        Ok(NewBook {
            title: request.title.ok_or_else(|| missing("Title"))?,
            author: request.author.ok_or_else(|| missing("Author"))?,
            genre: request.genre.unwrap_or_else(|| DEFAULT_GENRE.to_string()),
            year: request.year.ok_or_else(|| missing("Year"))?,
            copies_available: request.copies_available.unwrap_or(1),
            cover_ref: request.cover_ref,
        })
    }
}

/// Update book request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Year must be a positive integer"))]
    pub year: Option<i32>,
    /// New shelf count; total copies follow as shelf + on loan
    #[validate(range(min = 0, message = "Copies available must be 0 or more"))]
    pub copies_available: Option<i32>,
    /// New owned count; must cover copies currently on loan
    #[validate(range(min = 0, message = "Total copies must be 0 or more"))]
    pub total_copies: Option<i32>,
    pub cover_ref: Option<String>,
}

impl UpdateBook {
    pub fn trimmed(self) -> Self {
        Self {
            title: self.title.map(|t| t.trim().to_string()),
            author: self.author.map(|a| a.trim().to_string()),
            genre: self.genre.map(|g| {
                let g = g.trim();
                if g.is_empty() {
                    DEFAULT_GENRE.to_string()
                } else {
                    g.to_string()
                }
            }),
            ..self
        }
    }

    pub fn touches_stock(&self) -> bool {
        self.copies_available.is_some() || self.total_copies.is_some()
    }
}

/// Book list query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive substring over title, author and genre
    pub q: Option<String>,
    /// Exact genre
    pub genre: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    /// Filter text, ignoring blank input
    pub fn filter(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}

/// Escape LIKE metacharacters and wrap for a substring match
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
