//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults are provided for convenience during development.
//! Nothing is validated at startup: a missing credential surfaces as a
//! downstream call failure, not a boot error.
use std::env;
use dotenv;

pub struct Config {
    pub sanity_project_id: String,
    pub sanity_dataset: String,
    pub sanity_api_version: String,
    pub sanity_write_token: String,
    pub admin_origin: String,
    pub github_token: String,
    pub github_owner: String,
    pub github_repo: String,
    pub preview_host: String,
    pub api_host: String,
    pub api_port: String,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Result<Self, env::VarError> {
        Ok(Config {
            sanity_project_id: env::var("SANITY_PROJECT_ID").unwrap_or_else(|_| "jbvskr1t".to_string()),
            sanity_dataset: env::var("SANITY_DATASET").unwrap_or_else(|_| "production".to_string()),
            sanity_api_version: env::var("SANITY_API_VERSION").unwrap_or_else(|_| "2024-01-01".to_string()),
            sanity_write_token: env::var("SANITY_WRITE_TOKEN").unwrap_or_else(|_| String::new()),
            admin_origin: env::var("ADMIN_ORIGIN").unwrap_or_else(|_| "http://localhost:4322".to_string()),
            github_token: env::var("GITHUB_TOKEN").unwrap_or_else(|_| String::new()),
            github_owner: env::var("GITHUB_OWNER").unwrap_or_else(|_| "ericvanlare".to_string()),
            github_repo: env::var("GITHUB_REPO").unwrap_or_else(|_| "webcomic-sandbox".to_string()),
            preview_host: env::var("PREVIEW_HOST").unwrap_or_else(|_| "webcomic-sandbox.pages.dev".to_string()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8787".to_string()),
        })
    }
}
