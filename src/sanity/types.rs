//! Typed shapes for content-store documents and API bodies.
//!
//! Everything coming back from the store is decoded into these structs at the
//! boundary; a missing required field fails the decode instead of leaking an
//! undefined value into the handlers.
use serde::{Deserialize, Serialize};

/// Raw comic episode document as stored.
#[derive(Debug, Clone, Deserialize)]
pub struct ComicDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    pub title: String,
    pub slug: Slug,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    pub image: ImageField,
    #[serde(rename = "altText")]
    pub alt_text: Option<String>,
    pub transcript: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Slug {
    pub current: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageField {
    pub asset: AssetRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

/// Display-ready episode with the image reference resolved to a URL.
#[derive(Debug, Clone, Serialize)]
pub struct ComicDisplay {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "altText", skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub hidden: bool,
}

/// Fields for creating an episode. `title` and `slug` are required by the
/// handler before anything is uploaded.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComicBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "altText")]
    pub alt_text: Option<String>,
    pub transcript: Option<String>,
}

/// Sparse patch: absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchComicBody {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "altText")]
    pub alt_text: Option<String>,
    pub transcript: Option<String>,
    pub hidden: Option<bool>,
}

/// GROQ query responses arrive wrapped in `{ "result": ... }`.
#[derive(Debug, Deserialize)]
pub struct QueryResponse<T> {
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub document: UploadedAsset,
}

#[derive(Debug, Deserialize)]
pub struct UploadedAsset {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MutateResponse {
    pub results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
pub struct MutateResult {
    pub id: String,
}
