//! Cursor-based post list

use serde::{Deserialize, Serialize};

use super::PostSummary;
use crate::cms::{ApiResponse, CmsError, ContentSource};

/// A list of post summaries plus the cursor of the next page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPagination {
    pub results: Vec<PostSummary>,
    pub next_page: Option<String>,
}

impl PostPagination {
    /// Narrow an API response, dropping documents that cannot be routed
    pub fn from_response(response: ApiResponse) -> Self {
        let results = response
            .results
            .iter()
            .filter_map(PostSummary::from_document)
            .collect();
        Self {
            results,
            next_page: response.next_page,
        }
    }

    /// Fetch the first page of posts
    pub async fn fetch_first(
        source: &dyn ContentSource,
        kind: &str,
        page_size: usize,
    ) -> Result<Self, CmsError> {
        let response = source.get_by_type(kind, page_size).await?;
        Ok(Self::from_response(response))
    }

    /// Fetch the page a cursor points to
    pub async fn fetch_next(source: &dyn ContentSource, cursor: &str) -> Result<Self, CmsError> {
        let response = source.follow(cursor).await?;
        Ok(Self::from_response(response))
    }

    /// Whether another page can be requested
    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Append a following page and take over its cursor.
    ///
    /// Entries are not de-duplicated.
    pub fn extend(&mut self, next: PostPagination) {
        self.results.extend(next.results);
        self.next_page = next.next_page;
    }

    /// Fetch the next page and append it, returning the number of new entries.
    ///
    /// On error the list and cursor are left untouched.
    pub async fn load_more(&mut self, source: &dyn ContentSource) -> Result<usize, CmsError> {
        let Some(cursor) = self.next_page.as_deref() else {
            return Ok(0);
        };
        let next = Self::fetch_next(source, cursor).await?;
        let added = next.results.len();
        tracing::debug!("Loaded {} more posts", added);
        self.extend(next);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{MemorySource, RawDocument, RawPostData};

    fn source(n: usize) -> MemorySource {
        let documents = (1..=n)
            .map(|i| RawDocument {
                uid: Some(format!("post-{}", i)),
                kind: "posts".to_string(),
                data: RawPostData {
                    title: Some(format!("Post {}", i)),
                    ..RawPostData::default()
                },
                ..RawDocument::default()
            })
            .collect();
        MemorySource::new(documents)
    }

    fn uids(list: &PostPagination) -> Vec<&str> {
        list.results.iter().map(|p| p.uid.as_str()).collect()
    }

    #[tokio::test]
    async fn test_two_load_mores_keep_fetch_order() {
        let source = source(5);
        let mut list = PostPagination::fetch_first(&source, "posts", 2)
            .await
            .unwrap();
        assert_eq!(uids(&list), ["post-1", "post-2"]);
        let first_page = list.results.clone();

        assert_eq!(list.load_more(&source).await.unwrap(), 2);
        assert_eq!(&list.results[..2], &first_page[..]);
        assert!(list.has_more());

        assert_eq!(list.load_more(&source).await.unwrap(), 1);
        assert_eq!(
            uids(&list),
            ["post-1", "post-2", "post-3", "post-4", "post-5"]
        );
        assert!(!list.has_more());
    }

    #[tokio::test]
    async fn test_load_more_without_cursor_is_noop() {
        let source = source(1);
        let mut list = PostPagination::fetch_first(&source, "posts", 2)
            .await
            .unwrap();
        assert!(list.next_page.is_none());
        assert_eq!(list.load_more(&source).await.unwrap(), 0);
        assert_eq!(list.results.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_more_keeps_state() {
        let source = source(3);
        let mut list = PostPagination {
            results: Vec::new(),
            next_page: Some("https://elsewhere.example/page/2".to_string()),
        };
        assert!(list.load_more(&source).await.is_err());
        assert!(list.results.is_empty());
        assert_eq!(
            list.next_page.as_deref(),
            Some("https://elsewhere.example/page/2")
        );
    }

    #[test]
    fn test_extend_keeps_duplicates() {
        let summary = PostSummary {
            uid: "same".to_string(),
            first_publication_date: None,
            title: String::new(),
            subtitle: String::new(),
            author: String::new(),
        };
        let mut list = PostPagination {
            results: vec![summary.clone()],
            next_page: Some("cursor".to_string()),
        };
        list.extend(PostPagination {
            results: vec![summary],
            next_page: None,
        });
        assert_eq!(list.results.len(), 2);
        assert!(list.next_page.is_none());
    }
}
