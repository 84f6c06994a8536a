//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RichTextNode;
use crate::cms::RawDocument;
use crate::helpers::parse_date;

/// Average reading speed used for the reading time estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// A post as shown in the post list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Unique identifier, used as route and list key
    pub uid: String,

    /// First publication date
    pub first_publication_date: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl PostSummary {
    /// Narrow a raw document to the fields the list needs.
    ///
    /// Returns `None` for documents without a UID since they cannot be routed.
    pub fn from_document(doc: &RawDocument) -> Option<Self> {
        let uid = doc.uid.clone().filter(|u| !u.is_empty())?;
        Some(Self {
            uid,
            first_publication_date: doc.first_publication_date.as_deref().and_then(parse_date),
            title: doc.data.title.clone().unwrap_or_default(),
            subtitle: doc.data.subtitle.clone().unwrap_or_default(),
            author: doc.data.author.clone().unwrap_or_default(),
        })
    }
}

/// A full post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub uid: String,

    /// First publication date
    pub first_publication_date: Option<DateTime<Utc>>,

    /// Last publication date
    pub last_publication_date: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,

    /// Banner image URL
    pub banner: Option<String>,

    /// Content blocks in document order
    pub content: Vec<ContentBlock>,
}

/// A section of a post: a heading followed by rich text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

impl Post {
    /// Map a raw document into a post, omitting whatever is missing
    pub fn from_document(uid: &str, doc: RawDocument) -> Self {
        let data = doc.data;
        let content = data
            .content
            .into_iter()
            .map(|block| ContentBlock {
                heading: block.heading.unwrap_or_default(),
                body: block.body,
            })
            .collect();

        Self {
            uid: doc.uid.unwrap_or_else(|| uid.to_string()),
            first_publication_date: doc.first_publication_date.as_deref().and_then(parse_date),
            last_publication_date: doc.last_publication_date.as_deref().and_then(parse_date),
            title: data.title.unwrap_or_default(),
            subtitle: data.subtitle.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            banner: data
                .banner
                .and_then(|b| b.url)
                .filter(|url| !url.trim().is_empty()),
            content,
        }
    }

    /// Estimated reading time in minutes
    pub fn reading_time(&self) -> usize {
        estimate_reading_time(&self.content)
    }
}

/// Count words the way the reading estimate does: split on single spaces
pub fn count_words(blocks: &[ContentBlock]) -> usize {
    blocks
        .iter()
        .map(|block| {
            block.heading.split(' ').count()
                + block
                    .body
                    .iter()
                    .map(|node| node.text.split(' ').count())
                    .sum::<usize>()
        })
        .sum()
}

/// Minutes needed to read the blocks, rounded up
pub fn estimate_reading_time(blocks: &[ContentBlock]) -> usize {
    count_words(blocks).div_ceil(WORDS_PER_MINUTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{RawContentBlock, RawImage, RawPostData};

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn block(heading_words: usize, body_words: &[usize]) -> ContentBlock {
        ContentBlock {
            heading: words(heading_words),
            body: body_words
                .iter()
                .map(|n| RichTextNode::paragraph(&words(*n)))
                .collect(),
        }
    }

    fn raw_post() -> RawDocument {
        RawDocument {
            id: "X1".to_string(),
            uid: Some("hello".to_string()),
            kind: "posts".to_string(),
            first_publication_date: Some("2021-03-15T10:00:00+0000".to_string()),
            last_publication_date: None,
            data: RawPostData {
                title: Some("Hello".to_string()),
                subtitle: Some("World".to_string()),
                author: Some("Ana".to_string()),
                banner: Some(RawImage {
                    url: Some("https://images.example/banner.png".to_string()),
                    alt: None,
                }),
                content: vec![RawContentBlock {
                    heading: Some("Intro".to_string()),
                    body: vec![RichTextNode::paragraph("one two")],
                }],
            },
        }
    }

    #[test]
    fn test_summary_projection() {
        let summary = PostSummary::from_document(&raw_post()).unwrap();
        assert_eq!(summary.uid, "hello");
        assert_eq!(summary.title, "Hello");
        assert_eq!(summary.subtitle, "World");
        assert_eq!(summary.author, "Ana");
        assert_eq!(
            summary.first_publication_date.unwrap().to_rfc3339(),
            "2021-03-15T10:00:00+00:00"
        );
    }

    #[test]
    fn test_summary_requires_uid() {
        let mut doc = raw_post();
        doc.uid = None;
        assert!(PostSummary::from_document(&doc).is_none());
    }

    #[test]
    fn test_post_from_document() {
        let post = Post::from_document("hello", raw_post());
        assert_eq!(post.title, "Hello");
        assert_eq!(
            post.banner.as_deref(),
            Some("https://images.example/banner.png")
        );
        assert_eq!(post.content.len(), 1);
        assert_eq!(post.content[0].heading, "Intro");
        assert!(post.last_publication_date.is_none());
    }

    #[test]
    fn test_post_from_malformed_document() {
        let doc = RawDocument {
            data: RawPostData {
                banner: Some(RawImage::default()),
                ..RawPostData::default()
            },
            ..RawDocument::default()
        };
        let post = Post::from_document("missing-bits", doc);
        assert_eq!(post.uid, "missing-bits");
        assert!(post.banner.is_none());
        assert!(post.first_publication_date.is_none());
        assert!(post.content.is_empty());
        assert_eq!(post.reading_time(), 0);
    }

    #[test]
    fn test_count_words() {
        let blocks = vec![block(2, &[3, 4]), block(1, &[])];
        assert_eq!(count_words(&blocks), 10);
    }

    #[test]
    fn test_reading_time_boundaries() {
        assert_eq!(estimate_reading_time(&[block(1, &[])]), 1);
        assert_eq!(estimate_reading_time(&[block(100, &[100])]), 1);
        assert_eq!(estimate_reading_time(&[block(100, &[101])]), 2);
        assert_eq!(estimate_reading_time(&[block(200, &[200])]), 2);
        assert_eq!(estimate_reading_time(&[block(200, &[201])]), 3);
    }

    #[test]
    fn test_reading_time_monotonic() {
        let mut last = 0;
        for n in 1..=1000 {
            let minutes = estimate_reading_time(&[block(n, &[])]);
            assert!(minutes >= last);
            last = minutes;
        }
        assert_eq!(last, 5);
    }

    #[test]
    fn test_naive_split_counts_double_spaces() {
        let blocks = vec![ContentBlock {
            heading: "a  b".to_string(),
            body: Vec::new(),
        }];
        assert_eq!(count_words(&blocks), 3);
    }
}
