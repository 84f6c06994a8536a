//! Built-in templates using the Tera template engine
//!
//! The page templates and static assets are embedded in the binary.

use anyhow::Result;
use serde::Serialize;
use tera::{Context, Tera};

use crate::i18n::UiStrings;

/// Static assets: (path relative to the site root, content type, content)
pub const ASSETS: &[(&str, &str, &str)] = &[
    ("Logo.svg", "image/svg+xml", include_str!("assets/Logo.svg")),
    ("style.css", "text/css; charset=utf-8", include_str!("assets/style.css")),
    (
        "load-more.js",
        "text/javascript; charset=utf-8",
        include_str!("assets/load-more.js"),
    ),
];

/// Look up an embedded asset by its path
pub fn asset(path: &str) -> Option<(&'static str, &'static str)> {
    let path = path.trim_start_matches('/');
    ASSETS
        .iter()
        .find(|(name, _, _)| *name == path)
        .map(|(_, content_type, content)| (*content_type, *content))
}

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Autoescaping stays on for .html templates; rendered rich text is
        // passed through `safe` after serialization.
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("fallback.html", include_str!("theme/fallback.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("theme/partials/header.html"),
            ),
            (
                "partials/icon_calendar.html",
                include_str!("theme/partials/icon_calendar.html"),
            ),
            (
                "partials/icon_user.html",
                include_str!("theme/partials/icon_user.html"),
            ),
            (
                "partials/icon_clock.html",
                include_str!("theme/partials/icon_clock.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub root: String,
    pub logo: String,
    pub stylesheet: String,
    pub script: String,
}

/// A post list entry, also returned by the load-more endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub uid: String,
    pub href: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Localized display date
    pub date: Option<String>,
    /// Machine-readable date for `<time datetime>`
    pub datetime: Option<String>,
}

/// One page of the post list
#[derive(Debug, Clone, Serialize)]
pub struct ListData {
    pub results: Vec<SummaryData>,
    /// CMS cursor of the following page, without credentials
    pub next_page: Option<String>,
    /// Where the browser fetches the following page
    pub next_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    pub author: String,
    pub banner: Option<String>,
    pub date: Option<String>,
    pub datetime: Option<String>,
    pub reading_time: usize,
    pub description: String,
    pub blocks: Vec<BlockData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockData {
    pub heading: String,
    /// Serialized rich text, already escaped
    pub body_html: String,
}

/// Values every page needs
pub fn base_context(lang: &str, site: &SiteData, ui: &UiStrings) -> Context {
    let mut context = Context::new();
    context.insert("lang", lang);
    context.insert("site", site);
    context.insert("ui", ui);
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context
}
