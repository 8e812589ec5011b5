//! Common error type and result alias.
//!
//! Downstream services never get retried; a failed call is reported once
//! with whatever status/body the remote side returned.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("http client error: {0}")]
    HttpClient(reqwest::Error),
    #[error("content store error: {0}")]
    Sanity(String),
    #[error("github error: {0}")]
    GitHub(String),
}

pub type AppResult<T> = Result<T, AppError>;
