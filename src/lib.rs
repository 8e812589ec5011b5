//! Webcomic edge API library
//!
//! Modules:
//! - `api`: Axum HTTP handlers, router setup, CORS policy, response envelope.
//! - `sanity`: Thin client for the Sanity content store (GROQ reads, asset
//!   upload, document mutations).
//! - `github`: Thin client for the GitHub REST and GraphQL APIs.
//! - `aimod`: AI-modification workflow (issue/PR orchestration and status
//!   derivation).
//! - `utils`: Pure helpers like image upload validation.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `SanityClient`,
//! `GitHubClient`, and `ModWorkflow`.
pub mod aimod;
pub mod api;
pub mod config;
pub mod error;
pub mod github;
pub mod sanity;
pub mod utils;

pub use aimod::workflow::ModWorkflow;
pub use config::Config;
pub use github::client::GitHubClient;
pub use sanity::client::SanityClient;
