//! Content API adapter
//!
//! Everything the site knows about the CMS goes through [`ContentSource`]:
//! fetch a page of documents by type, follow a `next_page` cursor and look up
//! a single document by its UID. [`PrismicClient`] talks to the Prismic REST
//! API; [`MemorySource`] serves documents from a JSON fixture.

mod error;
mod memory;
mod prismic;

pub use error::CmsError;
pub use memory::MemorySource;
pub use prismic::PrismicClient;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::config::SiteConfig;
use crate::content::RichTextNode;

/// A page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiResponse {
    pub page: u32,
    pub total_pages: u32,
    #[serde(deserialize_with = "nullable")]
    pub results: Vec<RawDocument>,
    /// Fully-formed URL of the next page, absent on the last page
    pub next_page: Option<String>,
}

/// A document as returned by the API
///
/// Every field is optional; missing content is handled when mapping into
/// [`crate::content::Post`] instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDocument {
    pub id: String,
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub first_publication_date: Option<String>,
    pub last_publication_date: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub data: RawPostData,
}

/// The `data` object of a post document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPostData {
    #[serde(deserialize_with = "text_field")]
    pub title: Option<String>,
    #[serde(deserialize_with = "text_field")]
    pub subtitle: Option<String>,
    #[serde(deserialize_with = "text_field")]
    pub author: Option<String>,
    pub banner: Option<RawImage>,
    #[serde(deserialize_with = "nullable")]
    pub content: Vec<RawContentBlock>,
}

/// Image field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawImage {
    pub url: Option<String>,
    pub alt: Option<String>,
}

/// One entry of the `content` group field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContentBlock {
    #[serde(deserialize_with = "text_field")]
    pub heading: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub body: Vec<RichTextNode>,
}

/// Access to the headless CMS
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of documents of a custom type
    async fn get_by_type(&self, kind: &str, page_size: usize) -> Result<ApiResponse, CmsError>;

    /// Fetch the page a `next_page` cursor points to
    async fn follow(&self, cursor: &str) -> Result<ApiResponse, CmsError>;

    /// Look up a document by UID, optionally against a preview ref.
    /// Returns `Ok(None)` when no such document exists.
    async fn get_by_uid(
        &self,
        kind: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<RawDocument>, CmsError>;

    /// Source name for logging
    fn name(&self) -> &'static str {
        "ContentSource"
    }
}

/// Build the content source described by the configuration
///
/// A `fixture` file takes precedence over the Prismic endpoint.
pub fn from_config(
    config: &SiteConfig,
    base_dir: &std::path::Path,
) -> Result<Box<dyn ContentSource>, CmsError> {
    if let Some(fixture) = &config.fixture {
        let path = base_dir.join(fixture);
        tracing::info!("Loading content fixture {:?}", path);
        return Ok(Box::new(MemorySource::load(&path)?));
    }
    Ok(Box::new(PrismicClient::new(&config.prismic)?))
}

/// Query parameter carrying the repository access token
const ACCESS_TOKEN: &str = "access_token";

/// A cursor safe to hand to browsers, with the access token removed.
///
/// Cursors that are not URLs are returned unchanged.
pub fn public_cursor(cursor: &str) -> String {
    match Url::parse(cursor) {
        Ok(mut url) => {
            if remove_access_token(&mut url) {
                url.to_string()
            } else {
                cursor.to_string()
            }
        }
        _ => cursor.to_string(),
    }
}

/// Drop every `access_token` query pair, returns whether one was present
fn remove_access_token(url: &mut Url) -> bool {
    if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN) {
        return false;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != ACCESS_TOKEN)
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    true
}

/// Treat an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept either a plain string or a rich text field for text content
fn text_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Array(nodes)) => {
            let text: Vec<&str> = nodes
                .iter()
                .filter_map(|n| n.get("text").and_then(|t| t.as_str()))
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(text.join(" "))
            }
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_cursor_drops_access_token() {
        assert_eq!(
            public_cursor(
                "https://blog.cdn.prismic.io/api/v2/documents/search?ref=abc&access_token=secret&page=2"
            ),
            "https://blog.cdn.prismic.io/api/v2/documents/search?ref=abc&page=2"
        );
        assert_eq!(
            public_cursor("https://blog.cdn.prismic.io/api/v2/documents/search?access_token=secret"),
            "https://blog.cdn.prismic.io/api/v2/documents/search"
        );
        assert_eq!(
            public_cursor("memory://posts?page=2&pageSize=2"),
            "memory://posts?page=2&pageSize=2"
        );
        assert_eq!(public_cursor("not a url"), "not a url");
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "page": 1,
            "total_pages": 2,
            "next_page": "https://blog.cdn.prismic.io/api/v2/documents/search?page=2",
            "results": [{
                "id": "YC1",
                "uid": "como-utilizar-hooks",
                "type": "posts",
                "first_publication_date": "2021-03-15T19:25:28+0000",
                "data": {
                    "title": "Como utilizar Hooks",
                    "subtitle": "Pensando em sincronização em vez de ciclos de vida",
                    "author": "Joseph Oliveira",
                    "banner": { "url": "https://images.prismic.io/banner.png" },
                    "content": [{
                        "heading": "Proin et varius",
                        "body": [{ "type": "paragraph", "text": "Lorem ipsum", "spans": [] }]
                    }]
                }
            }]
        }"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.next_page.is_some());

        let doc = &response.results[0];
        assert_eq!(doc.uid.as_deref(), Some("como-utilizar-hooks"));
        assert_eq!(doc.data.author.as_deref(), Some("Joseph Oliveira"));
        assert_eq!(doc.data.content[0].body[0].text, "Lorem ipsum");
    }

    #[test]
    fn test_parse_malformed_document() {
        let json = r#"{
            "uid": "broken",
            "first_publication_date": null,
            "data": { "title": null, "banner": {}, "content": null }
        }"#;
        let doc: RawDocument = serde_json::from_str(json).unwrap();
        assert!(doc.first_publication_date.is_none());
        assert!(doc.data.title.is_none());
        assert!(doc.data.banner.unwrap().url.is_none());
        assert!(doc.data.content.is_empty());
    }

    #[test]
    fn test_rich_text_title() {
        let json = r#"{ "title": [{ "type": "heading1", "text": "Hello", "spans": [] }] }"#;
        let data: RawPostData = serde_json::from_str(json).unwrap();
        assert_eq!(data.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_null_next_page() {
        let response: ApiResponse =
            serde_json::from_str(r#"{ "results": [], "next_page": null }"#).unwrap();
        assert!(response.next_page.is_none());
        assert!(response.results.is_empty());
    }
}
