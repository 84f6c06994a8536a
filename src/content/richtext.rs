//! Prismic rich text to HTML
//!
//! The serializer is the trust boundary for CMS content: every text run is
//! escaped and only link and image URLs with an allowed scheme are emitted.
//! Provider markup from embeds is never copied into the output.

use serde::{Deserialize, Serialize};

use crate::helpers::{html_escape, safe_url};

/// One block of a rich text field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub spans: Vec<Span>,
    /// Image source (image nodes)
    pub url: Option<String>,
    pub alt: Option<String>,
    /// Embed metadata (embed nodes)
    pub oembed: Option<Embed>,
}

/// Inline formatting over a character range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<SpanData>,
}

/// Hyperlink or label payload of a span
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanData {
    pub url: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
}

/// oEmbed payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Embed {
    pub embed_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub provider_name: Option<String>,
    pub title: Option<String>,
}

impl RichTextNode {
    /// A plain paragraph
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: "paragraph".to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }
}

/// Render a rich text field as HTML
pub fn as_html(nodes: &[RichTextNode]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for node in nodes {
        let list = match node.kind.as_str() {
            "list-item" => Some("ul"),
            "o-list-item" => Some("ol"),
            _ => None,
        };
        if list != open_list {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{}>", tag));
            }
            if let Some(tag) = list {
                html.push_str(&format!("<{}>", tag));
            }
            open_list = list;
        }
        html.push_str(&serialize_node(node));
    }

    if let Some(tag) = open_list {
        html.push_str(&format!("</{}>", tag));
    }
    html
}

/// Plain text of a rich text field, one line per block
pub fn as_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .map(|n| n.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn serialize_node(node: &RichTextNode) -> String {
    let kind = node.kind.as_str();
    match kind {
        "paragraph" => wrap("p", node),
        "preformatted" => wrap("pre", node),
        "list-item" | "o-list-item" => wrap("li", node),
        "image" => serialize_image(node),
        "embed" => serialize_embed(node),
        _ => match heading_level(kind) {
            Some(level) => wrap(&format!("h{}", level), node),
            None => wrap("p", node),
        },
    }
}

fn heading_level(kind: &str) -> Option<u8> {
    kind.strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=6).contains(n))
}

fn wrap(tag: &str, node: &RichTextNode) -> String {
    format!(
        "<{tag}>{}</{tag}>",
        render_spans(&node.text, &node.spans),
        tag = tag
    )
}

fn serialize_image(node: &RichTextNode) -> String {
    match node.url.as_deref().and_then(safe_url) {
        Some(src) => format!(
            r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
            html_escape(src),
            html_escape(node.alt.as_deref().unwrap_or(""))
        ),
        None => String::new(),
    }
}

fn serialize_embed(node: &RichTextNode) -> String {
    let Some(embed) = &node.oembed else {
        return String::new();
    };
    let Some(url) = embed.embed_url.as_deref().and_then(safe_url) else {
        return String::new();
    };
    let url = html_escape(url);
    let label = embed.title.as_deref().map(html_escape).unwrap_or_else(|| url.clone());
    format!(
        r#"<div data-oembed="{url}" data-oembed-type="{}" data-oembed-provider="{}"><a href="{url}" target="_blank" rel="noopener noreferrer">{}</a></div>"#,
        html_escape(embed.kind.as_deref().unwrap_or("")),
        html_escape(embed.provider_name.as_deref().unwrap_or("")),
        label,
        url = url
    )
}

fn span_tags(span: &Span) -> (String, &'static str) {
    let data = span.data.as_ref();
    match span.kind.as_str() {
        "strong" => ("<strong>".to_string(), "</strong>"),
        "em" => ("<em>".to_string(), "</em>"),
        "hyperlink" => match data.and_then(|d| d.url.as_deref()).and_then(safe_url) {
            Some(url) => {
                let target = match data.and_then(|d| d.target.as_deref()) {
                    Some("_blank") => r#" target="_blank" rel="noopener noreferrer""#,
                    _ => "",
                };
                (format!(r#"<a href="{}"{}>"#, html_escape(url), target), "</a>")
            }
            None => ("<span>".to_string(), "</span>"),
        },
        "label" => match data.and_then(|d| d.label.as_deref()) {
            Some(label) => (
                format!(r#"<span class="{}">"#, html_escape(label)),
                "</span>",
            ),
            None => ("<span>".to_string(), "</span>"),
        },
        _ => ("<span>".to_string(), "</span>"),
    }
}

/// Apply spans to a text run. Offsets are character indices; spans that
/// overlap without nesting are split so the output stays well-formed.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut spans: Vec<&Span> = spans
        .iter()
        .filter(|s| s.start < s.end && s.start < len)
        .collect();
    // Longer spans first at the same start so they enclose the shorter ones
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let end_of = |s: &Span| s.end.min(len);
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<&Span> = Vec::new();
    let mut next = 0;

    for i in 0..=len {
        if stack.iter().any(|s| end_of(s) <= i) {
            let mut reopen = Vec::new();
            while let Some(top) = stack.pop() {
                out.push_str(span_tags(top).1);
                if end_of(top) > i {
                    reopen.push(top);
                }
                if !stack.iter().any(|s| end_of(s) <= i) {
                    break;
                }
            }
            for span in reopen.into_iter().rev() {
                out.push_str(&span_tags(span).0);
                stack.push(span);
            }
        }

        while next < spans.len() && spans[next].start == i {
            out.push_str(&span_tags(spans[next]).0);
            stack.push(spans[next]);
            next += 1;
        }

        if let Some(c) = chars.get(i) {
            push_char(&mut out, *c);
        }
    }

    out
}

fn push_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        '\n' => out.push_str("<br />"),
        _ => out.push(c),
    }
}
