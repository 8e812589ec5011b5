//! Axum request handlers for the edge API.
//!
//! Input validation (missing fields, bad media types, empty descriptions)
//! happens before any downstream call and answers 400; downstream failures
//! answer 500 with the raw error as details. Routing misses answer 404.
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::api::envelope;
use crate::api::routes::AppState;
use crate::sanity::types::{CreateComicBody, PatchComicBody};
use crate::utils::validate::validate_image_file;

pub async fn health() -> Response {
    envelope::success(StatusCode::OK, json!({ "status": "ok" }))
}

pub async fn not_found() -> Response {
    envelope::error(StatusCode::NOT_FOUND, "Not found")
}

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// The `json` text field and optional `image` file field of a multipart
/// body. Unknown fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<(Option<String>, Option<UploadedFile>), Response> {
    let malformed = || envelope::error(StatusCode::BAD_REQUEST, "Malformed multipart body");
    let mut json_text = None;
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| malformed())? {
        let name = field.name().map(|name| name.to_string());
        match name.as_deref() {
            Some("json") => {
                json_text = Some(field.text().await.map_err(|_| malformed())?);
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|_| malformed())?.to_vec();
                image = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok((json_text, image))
}

fn content_type_of<B>(req: &Request<B>) -> String {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn parse_json_body<T: DeserializeOwned>(req: Request<Body>) -> Result<T, Response> {
    let invalid = || envelope::error(StatusCode::BAD_REQUEST, "Invalid JSON body");
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|_| invalid())?;
    serde_json::from_slice(&bytes).map_err(|_| invalid())
}

pub async fn create_comic(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    if !content_type_of(&req).contains("multipart/form-data") {
        return envelope::error(StatusCode::BAD_REQUEST, "Expected multipart/form-data");
    }
    let multipart = match Multipart::from_request(req, &()).await {
        Ok(multipart) => multipart,
        Err(_) => return envelope::error(StatusCode::BAD_REQUEST, "Malformed multipart body"),
    };
    let (json_text, image) = match read_form(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let Some(json_text) = json_text else {
        return envelope::error(StatusCode::BAD_REQUEST, "Missing json field in form data");
    };
    let Some(image) = image else {
        return envelope::error(StatusCode::BAD_REQUEST, "Missing image file in form data");
    };
    if let Some(message) = validate_image_file(image.bytes.len() as u64, &image.content_type) {
        return envelope::error(StatusCode::BAD_REQUEST, &message);
    }
    let fields: CreateComicBody = match serde_json::from_str(&json_text) {
        Ok(fields) => fields,
        Err(_) => return envelope::error(StatusCode::BAD_REQUEST, "Invalid JSON in json field"),
    };
    if fields.title.is_empty() || fields.slug.is_empty() {
        return envelope::error(StatusCode::BAD_REQUEST, "title and slug are required");
    }

    // Upload the asset, then create the document. Two independent calls: a
    // failure after upload leaves the asset orphaned.
    let result = async {
        let asset_id = state
            .sanity
            .upload_image(image.bytes, &image.filename, &image.content_type)
            .await?;
        state.sanity.create_episode(&fields, &asset_id).await
    }
    .await;

    match result {
        Ok(id) => envelope::success(StatusCode::CREATED, json!({ "_id": id })),
        Err(err) => envelope::failure("Failed to create comic", err),
    }
}

pub async fn list_comics_admin(State(state): State<Arc<AppState>>) -> Response {
    match state.sanity.get_all_admin(100).await {
        Ok(comics) => envelope::success(StatusCode::OK, comics),
        Err(err) => envelope::failure("Failed to list comics", err),
    }
}

pub async fn patch_comic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    req: Request<Body>,
) -> Response {
    let content_type = content_type_of(&req);

    let (fields, image): (PatchComicBody, Option<UploadedFile>) =
        if content_type.contains("multipart/form-data") {
            let multipart = match Multipart::from_request(req, &()).await {
                Ok(multipart) => multipart,
                Err(_) => {
                    return envelope::error(StatusCode::BAD_REQUEST, "Malformed multipart body")
                }
            };
            let (json_text, image) = match read_form(multipart).await {
                Ok(parts) => parts,
                Err(response) => return response,
            };
            let Some(json_text) = json_text else {
                return envelope::error(StatusCode::BAD_REQUEST, "Missing json field in form data");
            };
            let fields = match serde_json::from_str(&json_text) {
                Ok(fields) => fields,
                Err(_) => {
                    return envelope::error(StatusCode::BAD_REQUEST, "Invalid JSON in json field")
                }
            };
            if let Some(image) = &image {
                if let Some(message) =
                    validate_image_file(image.bytes.len() as u64, &image.content_type)
                {
                    return envelope::error(StatusCode::BAD_REQUEST, &message);
                }
            }
            (fields, image)
        } else if content_type.contains("application/json") {
            match parse_json_body(req).await {
                Ok(fields) => (fields, None),
                Err(response) => return response,
            }
        } else {
            return envelope::error(
                StatusCode::BAD_REQUEST,
                "Expected multipart/form-data or application/json",
            );
        };

    let result = async {
        let new_asset_id = match image {
            Some(image) => Some(
                state
                    .sanity
                    .upload_image(image.bytes, &image.filename, &image.content_type)
                    .await?,
            ),
            None => None,
        };
        state
            .sanity
            .patch_episode(&id, &fields, new_asset_id.as_deref())
            .await
    }
    .await;

    match result {
        Ok(()) => envelope::success(StatusCode::OK, json!({ "_id": id })),
        Err(err) => envelope::failure("Failed to patch comic", err),
    }
}

pub async fn delete_comic(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.sanity.delete_episode(&id).await {
        Ok(()) => envelope::success(StatusCode::OK, json!({ "_id": id, "deleted": true })),
        Err(err) => envelope::failure("Failed to delete comic", err),
    }
}

// AI modification endpoints

#[derive(Debug, Deserialize)]
struct RequestBody {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    pr_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectBody {
    pr_number: Option<u64>,
    issue_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviseBody {
    issue_number: Option<u64>,
    pr_number: Option<u64>,
    #[serde(default)]
    original_description: String,
    #[serde(default)]
    feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevertBody {
    pr_number: Option<u64>,
    description: Option<String>,
}

pub async fn ai_mod_request(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let body: RequestBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.description.trim().is_empty() {
        return envelope::error(StatusCode::BAD_REQUEST, "Description is required");
    }
    match state.workflow.request(&body.description).await {
        Ok(receipt) => envelope::success(StatusCode::CREATED, receipt),
        Err(err) => envelope::failure("Failed to create AI modification request", err),
    }
}

pub async fn ai_mod_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let issue_number = params.get("issue").and_then(|value| value.parse().ok());
    let Some(issue_number) = issue_number else {
        return envelope::error(StatusCode::BAD_REQUEST, "Issue number is required");
    };
    match state.workflow.status(issue_number).await {
        Ok(report) => envelope::success(StatusCode::OK, report),
        Err(err) => envelope::failure("Failed to get status", err),
    }
}

pub async fn ai_mod_list(State(state): State<Arc<AppState>>) -> Response {
    match state.workflow.list().await {
        Ok(summaries) => envelope::success(StatusCode::OK, summaries),
        Err(err) => envelope::failure("Failed to list requests", err),
    }
}

pub async fn ai_mod_approve(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let body: ApproveBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(pr_number) = body.pr_number else {
        return envelope::error(StatusCode::BAD_REQUEST, "PR number is required");
    };
    match state.workflow.approve(pr_number).await {
        Ok(()) => envelope::success(
            StatusCode::OK,
            json!({ "prNumber": pr_number, "merged": true }),
        ),
        Err(err) => envelope::failure("Failed to merge PR", err),
    }
}

pub async fn ai_mod_reject(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let body: RejectBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(pr_number) = body.pr_number else {
        return envelope::error(StatusCode::BAD_REQUEST, "PR number is required");
    };
    match state.workflow.reject(pr_number, body.issue_number).await {
        Ok(()) => envelope::success(
            StatusCode::OK,
            json!({ "prNumber": pr_number, "closed": true }),
        ),
        Err(err) => envelope::failure("Failed to reject changes", err),
    }
}

pub async fn ai_mod_revise(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let body: ReviseBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let (Some(issue_number), Some(pr_number)) = (body.issue_number, body.pr_number) else {
        return envelope::error(
            StatusCode::BAD_REQUEST,
            "Issue number and PR number are required",
        );
    };
    if body.feedback.trim().is_empty() {
        return envelope::error(StatusCode::BAD_REQUEST, "Feedback is required");
    }
    match state
        .workflow
        .revise(
            issue_number,
            pr_number,
            &body.original_description,
            &body.feedback,
        )
        .await
    {
        Ok(receipt) => envelope::success(StatusCode::CREATED, receipt),
        Err(err) => envelope::failure("Failed to create revision", err),
    }
}

pub async fn ai_mod_revert(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let body: RevertBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Some(pr_number) = body.pr_number else {
        return envelope::error(StatusCode::BAD_REQUEST, "PR number is required");
    };
    match state
        .workflow
        .revert(pr_number, body.description.as_deref())
        .await
    {
        Ok(receipt) => envelope::success(StatusCode::CREATED, receipt),
        Err(err) => envelope::failure("Failed to create revert request", err),
    }
}
