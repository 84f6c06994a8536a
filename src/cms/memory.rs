//! In-memory content source backed by a JSON fixture.

use std::path::Path;

use async_trait::async_trait;
use url::Url;

use super::{ApiResponse, CmsError, ContentSource, RawDocument};

const CURSOR_SCHEME: &str = "memory";

/// Serves a fixed list of documents with the same paging behavior as the API.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<RawDocument>,
}

impl MemorySource {
    /// Create a source from documents, kept in the given order
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    /// Load a JSON array of documents
    pub fn load(path: &Path) -> Result<Self, CmsError> {
        let content = std::fs::read_to_string(path)?;
        let documents: Vec<RawDocument> = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} documents from {:?}", documents.len(), path);
        Ok(Self::new(documents))
    }

    /// Build one page of results; pages are 1-based.
    ///
    /// Returns `None` when the page number is out of the representable range.
    fn page(&self, kind: &str, page: usize, page_size: usize) -> Option<ApiResponse> {
        let page_size = page_size.max(1);
        let offset = page.checked_sub(1)?.checked_mul(page_size)?;
        let matching: Vec<&RawDocument> =
            self.documents.iter().filter(|d| d.kind == kind).collect();
        let total_pages = matching.len().div_ceil(page_size);

        let results = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|d| (*d).clone())
            .collect();

        let next_page = (page < total_pages).then(|| {
            format!(
                "{}://{}?page={}&pageSize={}",
                CURSOR_SCHEME,
                kind,
                page + 1,
                page_size
            )
        });

        Some(ApiResponse {
            page: u32::try_from(page).ok()?,
            total_pages: u32::try_from(total_pages).ok()?,
            results,
            next_page,
        })
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn get_by_type(&self, kind: &str, page_size: usize) -> Result<ApiResponse, CmsError> {
        self.page(kind, 1, page_size).ok_or_else(|| {
            CmsError::InvalidCursor(format!("{}://{}?page=1", CURSOR_SCHEME, kind))
        })
    }

    async fn follow(&self, cursor: &str) -> Result<ApiResponse, CmsError> {
        let invalid = || CmsError::InvalidCursor(cursor.to_string());
        let url = Url::parse(cursor).map_err(|_| invalid())?;
        if url.scheme() != CURSOR_SCHEME {
            return Err(invalid());
        }
        let kind = url.host_str().ok_or_else(invalid)?;

        let mut page = None;
        let mut page_size = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "page" => page = value.parse::<usize>().ok(),
                "pageSize" => page_size = value.parse::<usize>().ok(),
                _ => {}
            }
        }
        match (page, page_size) {
            (Some(page), Some(page_size)) => self.page(kind, page, page_size).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    async fn get_by_uid(
        &self,
        kind: &str,
        uid: &str,
        _preview_ref: Option<&str>,
    ) -> Result<Option<RawDocument>, CmsError> {
        Ok(self
            .documents
            .iter()
            .find(|d| d.kind == kind && d.uid.as_deref() == Some(uid))
            .cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
