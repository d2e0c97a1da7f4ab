// errors.rs
use thiserror::Error;

use crate::scraper::ScraperError;

/// Errors that end a run, or that the reconciler counts per listing.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database Error: {0}")]
    DbError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scrape failed: {0}")]
    Scraper(#[from] ScraperError),

    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    #[error("No listings extracted; selectors may need updating or the site blocked the request")]
    NoListings,
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::DbError(err.to_string())
    }
}
