//! Prismic REST API v2 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{
    remove_access_token, ApiResponse, CmsError, ContentSource, RawDocument, ACCESS_TOKEN,
};
use crate::config::PrismicConfig;

/// Prismic API client.
pub struct PrismicClient {
    http: Client,
    endpoint: Url,
    access_token: Option<String>,
}

/// Repository information returned by the API root.
#[derive(Debug, Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

impl PrismicClient {
    /// Create a client for the configured repository.
    ///
    /// # Errors
    ///
    /// Returns [`CmsError::InvalidEndpoint`] if the endpoint is not an
    /// absolute http(s) URL.
    pub fn new(config: &PrismicConfig) -> Result<Self, CmsError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| CmsError::InvalidEndpoint(format!("{:?}: {}", config.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(CmsError::InvalidEndpoint(config.endpoint.clone()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            access_token: config.access_token.clone(),
        })
    }

    /// Resolve the ref of the currently published content.
    async fn master_ref(&self) -> Result<String, CmsError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN, token);
        }
        let info: ApiInfo = self.get_json(url).await?;
        info.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(CmsError::NoMasterRef)
    }

    /// Run a predicate query against the given ref.
    async fn search(
        &self,
        reference: &str,
        query: &str,
        page_size: usize,
    ) -> Result<ApiResponse, CmsError> {
        let url = self.search_url(reference, query, page_size)?;
        self.get_json(url).await
    }

    fn search_url(&self, reference: &str, query: &str, page_size: usize) -> Result<Url, CmsError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CmsError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push("documents")
            .push("search");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("ref", reference)
                .append_pair("q", query)
                .append_pair("pageSize", &page_size.to_string());
            if let Some(token) = &self.access_token {
                pairs.append_pair(ACCESS_TOKEN, token);
            }
        }
        Ok(url)
    }

    /// Accept only cursors pointing back at this repository.
    fn check_cursor(&self, cursor: &str) -> Result<Url, CmsError> {
        let url = Url::parse(cursor).map_err(|_| CmsError::InvalidCursor(cursor.to_string()))?;
        let same_origin = url.scheme() == self.endpoint.scheme()
            && url.host_str() == self.endpoint.host_str()
            && url.port_or_known_default() == self.endpoint.port_or_known_default();
        if same_origin {
            Ok(url)
        } else {
            Err(CmsError::InvalidCursor(cursor.to_string()))
        }
    }

    /// Request URL of a cursor, carrying this client's token and no other
    fn cursor_url(&self, cursor: &str) -> Result<Url, CmsError> {
        let mut url = self.check_cursor(cursor)?;
        remove_access_token(&mut url);
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN, token);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CmsError> {
        tracing::debug!("GET {}", url.path());
        let response = self.http.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CmsError::HttpResponse {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn get_by_type(&self, kind: &str, page_size: usize) -> Result<ApiResponse, CmsError> {
        let reference = self.master_ref().await?;
        self.search(&reference, &type_predicate(kind), page_size)
            .await
    }

    async fn follow(&self, cursor: &str) -> Result<ApiResponse, CmsError> {
        let url = self.cursor_url(cursor)?;
        self.get_json(url).await
    }

    async fn get_by_uid(
        &self,
        kind: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<RawDocument>, CmsError> {
        let reference = match preview_ref {
            Some(r) => r.to_string(),
            None => self.master_ref().await?,
        };
        let response = self
            .search(&reference, &uid_predicate(kind, uid), 1)
            .await?;
        Ok(response.results.into_iter().next())
    }

    fn name(&self) -> &'static str {
        "prismic"
    }
}

fn type_predicate(kind: &str) -> String {
    format!(r#"[[at(document.type,"{}")]]"#, escape_literal(kind))
}

fn uid_predicate(kind: &str, uid: &str) -> String {
    format!(
        r#"[[at(my.{}.uid,"{}")]]"#,
        escape_literal(kind),
        escape_literal(uid)
    )
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
