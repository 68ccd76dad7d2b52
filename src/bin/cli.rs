//! Libris CLI
//!
//! Terminal front-end over the same catalog and loan services as the server.

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio_stream::StreamExt;
use uuid::Uuid;

use libris_server::{
    config::AppConfig,
    ledger::Reconciliation,
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        loan::{BorrowRequest, BorrowerLoans, LoanHistoryQuery, LoanView, ReturnRequest},
    },
    repository::Repository,
    services::Services,
    telemetry,
};

/// Libris CLI
#[derive(Parser, Debug)]
#[command(name = "libris-cli")]
#[command(about = "Manage the library catalog and loans from the terminal")]
struct Args {
    /// Database URL (overrides configuration)
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a book
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        year: i32,

        /// Defaults to "General"
        #[arg(long)]
        genre: Option<String>,

        /// Copies on the shelf, defaults to 1
        #[arg(long)]
        copies: Option<i32>,
    },

    /// List books, newest first
    List {
        /// Substring over title, author and genre
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        genre: Option<String>,
    },

    /// Show one book
    Show { id: Uuid },

    /// Update a book
    Update {
        id: Uuid,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        /// New shelf count
        #[arg(long)]
        copies: Option<i32>,

        /// New owned count
        #[arg(long)]
        total: Option<i32>,
    },

    /// Delete a book
    Delete {
        id: Uuid,

        /// Close active loans and delete anyway
        #[arg(long)]
        force: bool,
    },

    /// Borrow copies of a book
    Borrow {
        book: Uuid,

        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: String,

        #[arg(short, long, default_value_t = 1)]
        copies: i32,
    },

    /// Return copies of a book
    Return {
        book: Uuid,

        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: String,

        #[arg(short, long, default_value_t = 1)]
        count: i32,
    },

    /// List active loans
    Active {
        #[arg(short, long)]
        book: Option<Uuid>,
    },

    /// Borrowers currently holding copies of a book
    Borrowers { book: Uuid },

    /// Loan history grouped by borrower
    History {
        #[arg(short, long)]
        book: Option<Uuid>,

        /// Substring over borrower name or phone
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Check copy counters against active loans
    Audit {
        #[arg(short, long)]
        book: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }

    // Ledger events stay quiet unless RUST_LOG asks for them
    let _log_guard = telemetry::init(&config.logging, "libris_server=warn");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let services = Services::new(Repository::new(pool), config.catalog.clone());
    execute(&services, args.command).await?;

    Ok(())
}

async fn execute(services: &Services, command: Commands) -> libris_server::AppResult<()> {
    match command {
        Commands::Add {
            title,
            author,
            year,
            genre,
            copies,
        } => {
            let book = services
                .catalog
                .add_book(CreateBook {
                    title: Some(title),
                    author: Some(author),
                    genre,
                    year: Some(year),
                    copies_available: copies,
                    cover_ref: None,
                })
                .await?;
            println!("Book added: {} ({})", book.title, book.id);
        }

        Commands::List { query, genre } => {
            let query = BookQuery {
                q: query,
                genre,
                ..Default::default()
            };
            let mut books = services.catalog.stream_books(&query);
            let mut found = 0;
            while let Some(book) = books.next().await {
                if found == 0 {
                    println!("Books:");
                }
                println!("{}", book_line(&book?));
                found += 1;
            }
            if found == 0 {
                println!("No books found");
            }
        }

        Commands::Show { id } => {
            let book = services.catalog.get_book(id).await?;
            println!("{}", book_line(&book));
            println!("  id:       {}", book.id);
            println!("  genre:    {}", book.genre);
            println!("  on loan:  {}", book.copies_on_loan());
            println!("  owned:    {}", book.total_copies);
        }

        Commands::Update {
            id,
            title,
            author,
            genre,
            year,
            copies,
            total,
        } => {
            let book = services
                .catalog
                .update_book(
                    id,
                    UpdateBook {
                        title,
                        author,
                        genre,
                        year,
                        copies_available: copies,
                        total_copies: total,
                        cover_ref: None,
                    },
                )
                .await?;
            println!("Book updated: {}", book_line(&book));
        }

        Commands::Delete { id, force } => {
            services.catalog.delete_book(id, force).await?;
            println!("Book deleted");
        }

        Commands::Borrow {
            book,
            name,
            phone,
            copies,
        } => {
            let outcome = services
                .loans
                .borrow(
                    book,
                    BorrowRequest {
                        borrower_name: name,
                        borrower_phone: phone,
                        copies,
                    },
                )
                .await?;
            println!(
                "Borrowed {} copy(ies) of \"{}\" to {}",
                copies, outcome.book.title, outcome.loan.borrower_name
            );
        }

        Commands::Return {
            book,
            name,
            phone,
            count,
        } => {
            let outcome = services
                .loans
                .return_copies(
                    book,
                    ReturnRequest {
                        borrower_name: name.clone(),
                        borrower_phone: phone,
                        count,
                    },
                )
                .await?;
            println!(
                "Returned {} copy(ies) from {}",
                outcome.returned,
                name.trim()
            );
        }

        Commands::Active { book } => {
            let mut loans = services.loans.stream_active(book);
            let mut found = 0;
            while let Some(loan) = loans.next().await {
                println!("{}", loan_line(&loan?));
                found += 1;
            }
            if found == 0 {
                println!("No active borrow records");
            }
        }

        Commands::Borrowers { book } => {
            let borrowers = services.loans.active_borrowers(book).await?;
            if borrowers.is_empty() {
                println!("No active borrowers for this book");
            }
            for group in &borrowers {
                println!(
                    "{} ({}) currently has {} active copy(ies)",
                    group.borrower_name, group.borrower_phone, group.active_copies
                );
            }
        }

        Commands::History { book, query } => {
            let history = services
                .loans
                .history(&LoanHistoryQuery { book_id: book, q: query })
                .await?;
            if history.is_empty() {
                println!("No borrow records");
            }
            for group in &history {
                print_history(group);
            }
        }

        Commands::Audit { book } => {
            let report = services.catalog.audit(book).await?;
            for entry in &report {
                println!("{}", audit_line(entry));
            }
        }
    }

    Ok(())
}

fn book_line(book: &Book) -> String {
    format!(
        "- {} ({}) by {} | Copies: {}",
        book.title, book.year, book.author, book.copies_available
    )
}

fn title_or_deleted(view: &LoanView) -> &str {
    view.book_title.as_deref().unwrap_or("(book deleted)")
}

fn loan_line(view: &LoanView) -> String {
    format!(
        "- {} | {} ({}) | Copies: {} | Borrowed on: {}",
        title_or_deleted(view),
        view.loan.borrower_name,
        view.loan.borrower_phone,
        view.loan.copies,
        view.loan.borrowed_at.format("%a %b %d %Y"),
    )
}

fn print_history(group: &BorrowerLoans) {
    println!(
        "\nBorrow records for {} ({}): {} copies borrowed, {} still out",
        group.borrower_name, group.borrower_phone, group.total_copies, group.active_copies
    );
    for view in &group.loans {
        let returned = view
            .loan
            .returned_at
            .map(|at| at.format("%a %b %d %Y").to_string())
            .unwrap_or_else(|| "No".to_string());
        println!(
            "- {} | Borrowed on: {} | Copies: {} | Returned: {}",
            title_or_deleted(view),
            view.loan.borrowed_at.format("%a %b %d %Y"),
            view.loan.copies_borrowed,
            returned,
        );
    }
}

fn audit_line(entry: &Reconciliation) -> String {
    let status = if entry.consistent {
        "ok".to_string()
    } else {
        format!("off by {}", entry.discrepancy)
    };
    format!(
        "- {} | available {} | on loan {} | owned {} | {}",
        entry.title, entry.copies_available, entry.active_copies, entry.total_copies, status
    )
}
