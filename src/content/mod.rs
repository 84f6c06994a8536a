//! Content module - post models, pagination and rich text

mod listing;
mod post;
mod richtext;

pub use listing::PostPagination;
pub use post::{
    count_words, estimate_reading_time, ContentBlock, Post, PostSummary, WORDS_PER_MINUTE,
};
pub use richtext::{as_html, as_text, Embed, RichTextNode, Span, SpanData};
