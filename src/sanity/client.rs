//! Thin HTTP client for the Sanity content store.
//!
//! Reads go through the GROQ query endpoint on the CDN host; writes (asset
//! upload, document create/patch/delete) go through the API host with the
//! write token. Upload-then-create is two independent calls: if the second
//! fails the uploaded asset is orphaned and no cleanup is attempted.
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::sanity::types::{
    ComicDisplay, ComicDoc, CreateComicBody, MutateResponse, PatchComicBody, QueryResponse,
    UploadResponse,
};

const COMIC_FIELDS: &str =
    "_id,_type,title,slug,publishedAt,image,altText,transcript,hidden";

#[derive(Clone)]
pub struct SanityClient {
    client: Client,
    project_id: String,
    dataset: String,
    api_version: String,
    write_token: String,
}

impl SanityClient {
    pub fn new(config: &Config) -> Self {
        SanityClient {
            client: Client::new(),
            project_id: config.sanity_project_id.clone(),
            dataset: config.sanity_dataset.clone(),
            api_version: config.sanity_api_version.clone(),
            write_token: config.sanity_write_token.clone(),
        }
    }

    fn query_url(&self) -> String {
        format!(
            "https://{}.apicdn.sanity.io/v{}/data/query/{}",
            self.project_id, self.api_version, self.dataset
        )
    }

    fn mutate_url(&self) -> String {
        format!(
            "https://{}.api.sanity.io/v{}/data/mutate/{}",
            self.project_id, self.api_version, self.dataset
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "https://{}.api.sanity.io/v{}/assets/images/{}",
            self.project_id, self.api_version, self.dataset
        )
    }

    /// Resolve a stored image reference like `image-<id>-<dims>-<ext>` into a
    /// fetchable CDN URL.
    pub fn image_url_from_ref(&self, reference: &str) -> AppResult<String> {
        let rest = reference
            .strip_prefix("image-")
            .ok_or_else(|| AppError::Sanity(format!("malformed image reference: {}", reference)))?;
        let (name, ext) = rest
            .rsplit_once('-')
            .filter(|(name, ext)| !name.is_empty() && !ext.is_empty())
            .ok_or_else(|| AppError::Sanity(format!("malformed image reference: {}", reference)))?;
        Ok(format!(
            "https://cdn.sanity.io/images/{}/{}/{}.{}",
            self.project_id, self.dataset, name, ext
        ))
    }

    fn to_display(&self, doc: ComicDoc) -> AppResult<ComicDisplay> {
        let image_url = self.image_url_from_ref(&doc.image.asset.reference)?;
        Ok(ComicDisplay {
            id: doc.id,
            title: doc.title,
            slug: doc.slug.current,
            published_at: doc.published_at,
            image_url,
            alt_text: doc.alt_text,
            transcript: doc.transcript,
            hidden: doc.hidden,
        })
    }

    // Adjacent-lookup results only need identity/title/slug for nav links, so
    // the image reference is left unresolved as an empty placeholder.
    fn to_nav_display(doc: ComicDoc) -> ComicDisplay {
        ComicDisplay {
            id: doc.id,
            title: doc.title,
            slug: doc.slug.current,
            published_at: doc.published_at,
            image_url: String::new(),
            alt_text: doc.alt_text,
            transcript: doc.transcript,
            hidden: doc.hidden,
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let mut pairs: Vec<(&str, String)> = vec![("query", query.to_string())];
        pairs.extend(params.iter().cloned());
        let response = self
            .client
            .get(self.query_url())
            .query(&pairs)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if response.status().is_success() {
            let wrapped: QueryResponse<T> =
                response.json().await.map_err(AppError::HttpClient)?;
            Ok(wrapped.result)
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AppError::Sanity(format!(
                "query failed: {} {}",
                status, body
            )))
        }
    }

    async fn fetch_one(
        &self,
        query: &str,
        params: &[(&str, String)],
    ) -> AppResult<Option<ComicDoc>> {
        self.fetch::<Option<ComicDoc>>(query, params).await
    }

    /// Latest public episode by publication date.
    pub async fn get_latest(&self) -> AppResult<Option<ComicDisplay>> {
        let doc = self.fetch_one(&latest_query(), &[]).await?;
        doc.map(|d| self.to_display(d)).transpose()
    }

    /// Public episode by its unique slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Option<ComicDisplay>> {
        let param = serde_json::to_string(slug)
            .map_err(|e| AppError::Sanity(format!("invalid slug parameter: {}", e)))?;
        let doc = self.fetch_one(&by_slug_query(), &[("$slug", param)]).await?;
        doc.map(|d| self.to_display(d)).transpose()
    }

    /// Archive listing, newest first, hidden episodes excluded.
    pub async fn get_archive(&self, limit: usize) -> AppResult<Vec<ComicDisplay>> {
        let docs: Vec<ComicDoc> = self.fetch(&archive_query(limit), &[]).await?;
        docs.into_iter().map(|d| self.to_display(d)).collect()
    }

    /// Admin listing: every episode including hidden ones.
    pub async fn get_all_admin(&self, limit: usize) -> AppResult<Vec<ComicDisplay>> {
        let docs: Vec<ComicDoc> = self.fetch(&all_admin_query(limit), &[]).await?;
        docs.into_iter().map(|d| self.to_display(d)).collect()
    }

    /// Admin listing of hidden episodes only.
    pub async fn get_hidden(&self, limit: usize) -> AppResult<Vec<ComicDisplay>> {
        let docs: Vec<ComicDoc> = self.fetch(&hidden_query(limit), &[]).await?;
        docs.into_iter().map(|d| self.to_display(d)).collect()
    }

    /// Nearest earlier- and later-published public episodes relative to a
    /// timestamp, fetched concurrently. Either side may be absent. Returned
    /// neighbors carry an empty image URL; callers must not treat it as valid.
    pub async fn get_adjacent(
        &self,
        published_at: &str,
    ) -> AppResult<(Option<ComicDisplay>, Option<ComicDisplay>)> {
        let param = serde_json::to_string(published_at)
            .map_err(|e| AppError::Sanity(format!("invalid publishedAt parameter: {}", e)))?;
        let params = [("$publishedAt", param)];
        let prev_q = prev_query();
        let next_q = next_query();
        let (prev, next) = tokio::try_join!(
            self.fetch_one(&prev_q, &params),
            self.fetch_one(&next_q, &params),
        )?;
        Ok((prev.map(Self::to_nav_display), next.map(Self::to_nav_display)))
    }

    /// Upload a binary image asset; returns the asset document id.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> AppResult<String> {
        let response = self
            .client
            .post(self.upload_url())
            .query(&[("filename", filename)])
            .bearer_auth(&self.write_token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if response.status().is_success() {
            let uploaded: UploadResponse =
                response.json().await.map_err(AppError::HttpClient)?;
            Ok(uploaded.document.id)
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AppError::Sanity(format!(
                "failed to upload image: {} {}",
                status, body
            )))
        }
    }

    async fn mutate(&self, mutations: Value, context: &str) -> AppResult<MutateResponse> {
        let response = self
            .client
            .post(self.mutate_url())
            .bearer_auth(&self.write_token)
            .json(&json!({ "mutations": mutations }))
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if response.status().is_success() {
            response.json().await.map_err(AppError::HttpClient)
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AppError::Sanity(format!(
                "failed to {}: {} {}",
                context, status, body
            )))
        }
    }

    /// Create an episode document referencing an uploaded asset; returns the
    /// new document id. `publishedAt` defaults to now.
    pub async fn create_episode(
        &self,
        fields: &CreateComicBody,
        asset_id: &str,
    ) -> AppResult<String> {
        let published_at = fields
            .published_at
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        let mutations = json!([{
            "create": {
                "_type": "comicEpisode",
                "title": fields.title,
                "slug": { "_type": "slug", "current": fields.slug },
                "publishedAt": published_at,
                "image": {
                    "_type": "image",
                    "asset": { "_type": "reference", "_ref": asset_id },
                },
                "altText": fields.alt_text.clone().unwrap_or_default(),
                "transcript": fields.transcript.clone().unwrap_or_default(),
            }
        }]);
        let result = self.mutate(mutations, "create document").await?;
        result
            .results
            .into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| AppError::Sanity("create returned no results".to_string()))
    }

    /// Patch an episode with only the fields present in the input. A new
    /// asset id replaces the whole image reference.
    pub async fn patch_episode(
        &self,
        document_id: &str,
        fields: &PatchComicBody,
        new_asset_id: Option<&str>,
    ) -> AppResult<()> {
        let mut set = Map::new();
        if let Some(title) = &fields.title {
            set.insert("title".to_string(), json!(title));
        }
        if let Some(slug) = &fields.slug {
            set.insert("slug".to_string(), json!({ "_type": "slug", "current": slug }));
        }
        if let Some(published_at) = &fields.published_at {
            set.insert("publishedAt".to_string(), json!(published_at));
        }
        if let Some(alt_text) = &fields.alt_text {
            set.insert("altText".to_string(), json!(alt_text));
        }
        if let Some(transcript) = &fields.transcript {
            set.insert("transcript".to_string(), json!(transcript));
        }
        if let Some(hidden) = fields.hidden {
            set.insert("hidden".to_string(), json!(hidden));
        }
        if let Some(asset_id) = new_asset_id {
            set.insert(
                "image".to_string(),
                json!({
                    "_type": "image",
                    "asset": { "_type": "reference", "_ref": asset_id },
                }),
            );
        }
        let mutations = json!([{ "patch": { "id": document_id, "set": set } }]);
        self.mutate(mutations, "patch document").await?;
        Ok(())
    }

    /// Delete an episode document.
    pub async fn delete_episode(&self, document_id: &str) -> AppResult<()> {
        let mutations = json!([{ "delete": { "id": document_id } }]);
        self.mutate(mutations, "delete document").await?;
        Ok(())
    }
}

// GROQ query construction. Public-facing queries carry the hidden filter;
// admin queries do not.

fn latest_query() -> String {
    format!(
        "*[_type == \"comicEpisode\" && hidden != true] | order(publishedAt desc)[0] {{{}}}",
        COMIC_FIELDS
    )
}

fn by_slug_query() -> String {
    format!(
        "*[_type == \"comicEpisode\" && slug.current == $slug && hidden != true][0] {{{}}}",
        COMIC_FIELDS
    )
}

fn archive_query(limit: usize) -> String {
    format!(
        "*[_type == \"comicEpisode\" && hidden != true] | order(publishedAt desc)[0..{}] {{{}}}",
        limit.saturating_sub(1),
        COMIC_FIELDS
    )
}

fn all_admin_query(limit: usize) -> String {
    format!(
        "*[_type == \"comicEpisode\"] | order(publishedAt desc)[0..{}] {{{}}}",
        limit.saturating_sub(1),
        COMIC_FIELDS
    )
}

fn hidden_query(limit: usize) -> String {
    format!(
        "*[_type == \"comicEpisode\" && hidden == true] | order(publishedAt desc)[0..{}] {{{}}}",
        limit.saturating_sub(1),
        COMIC_FIELDS
    )
}

fn prev_query() -> String {
    format!(
        "*[_type == \"comicEpisode\" && hidden != true && publishedAt < $publishedAt] | order(publishedAt desc)[0] {{{}}}",
        COMIC_FIELDS
    )
}

fn next_query() -> String {
    format!(
        "*[_type == \"comicEpisode\" && hidden != true && publishedAt > $publishedAt] | order(publishedAt asc)[0] {{{}}}",
        COMIC_FIELDS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SanityClient {
        SanityClient {
            client: Client::new(),
            project_id: "testproj".to_string(),
            dataset: "production".to_string(),
            api_version: "2024-01-01".to_string(),
            write_token: String::new(),
        }
    }

    #[test]
    fn image_ref_resolves_to_cdn_url() {
        let client = test_client();
        let url = client
            .image_url_from_ref("image-abc123-800x600-png")
            .unwrap();
        assert_eq!(
            url,
            "https://cdn.sanity.io/images/testproj/production/abc123-800x600.png"
        );
    }

    #[test]
    fn malformed_image_ref_is_an_error() {
        let client = test_client();
        assert!(client.image_url_from_ref("file-abc123-800x600-png").is_err());
        assert!(client.image_url_from_ref("image-").is_err());
        assert!(client.image_url_from_ref("image-noext").is_err());
    }

    #[test]
    fn public_queries_filter_hidden_and_admin_queries_do_not() {
        assert!(latest_query().contains("hidden != true"));
        assert!(by_slug_query().contains("hidden != true"));
        assert!(archive_query(50).contains("hidden != true"));
        // The shared field projection still selects `hidden`; only the
        // filter must be absent from the admin query.
        assert!(!all_admin_query(100).contains("hidden != true"));
        assert!(hidden_query(100).contains("hidden == true"));
    }

    #[test]
    fn archive_query_limit_is_inclusive_range() {
        assert!(archive_query(50).contains("[0..49]"));
        assert!(all_admin_query(100).contains("[0..99]"));
    }

    #[test]
    fn adjacent_queries_order_and_compare_correctly() {
        let prev = prev_query();
        assert!(prev.contains("publishedAt < $publishedAt"));
        assert!(prev.contains("order(publishedAt desc)[0]"));
        let next = next_query();
        assert!(next.contains("publishedAt > $publishedAt"));
        assert!(next.contains("order(publishedAt asc)[0]"));
        assert!(prev.contains("hidden != true"));
        assert!(next.contains("hidden != true"));
    }
}
