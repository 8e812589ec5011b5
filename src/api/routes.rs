//! Shared application state and router construction.
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{middleware, Router};

use crate::aimod::workflow::ModWorkflow;
use crate::api::{cors, handlers};
use crate::config::Config;
use crate::github::client::GitHubClient;
use crate::sanity::client::SanityClient;

pub struct AppState {
    pub sanity: SanityClient,
    pub workflow: ModWorkflow,
    pub admin_origin: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        AppState {
            sanity: SanityClient::new(config),
            workflow: ModWorkflow::new(GitHubClient::new(config), config.preview_host.clone()),
            admin_origin: config.admin_origin.clone(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/comics",
            post(handlers::create_comic).get(handlers::list_comics_admin),
        )
        .route(
            "/api/comics/:id",
            patch(handlers::patch_comic).delete(handlers::delete_comic),
        )
        .route("/api/ai-mod/request", post(handlers::ai_mod_request))
        .route("/api/ai-mod/list", get(handlers::ai_mod_list))
        .route("/api/ai-mod/status", get(handlers::ai_mod_status))
        .route("/api/ai-mod/approve", post(handlers::ai_mod_approve))
        .route("/api/ai-mod/reject", post(handlers::ai_mod_reject))
        .route("/api/ai-mod/revise", post(handlers::ai_mod_revise))
        .route("/api/ai-mod/revert", post(handlers::ai_mod_revert))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors::apply))
        .with_state(state)
}
