//! Generator module - fetches content and renders pages with the built-in templates

use anyhow::{Context as _, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::fs;
use std::time::{Duration, SystemTime};

use crate::cache::{Manifest, PageBody, PageCache};
use crate::cms::{public_cursor, CmsError, ContentSource};
use crate::content::{as_html, as_text, Post, PostPagination, PostSummary};
use crate::helpers::{date_xml, post_date, post_route, safe_url, truncate, url_for};
use crate::i18n::I18n;
use crate::templates::{
    base_context, BlockData, ListData, PostData, SiteData, SummaryData, TemplateRenderer, ASSETS,
};
use crate::Blog;

/// Length of the generated meta description
const DESCRIPTION_LENGTH: usize = 160;

/// Post list endpoint, relative to the site root
const API_POSTS: &str = "api/posts";

/// A page produced by a build, ready to be written or cached
#[derive(Debug, Clone)]
pub struct GeneratedPage {
    pub route: String,
    pub body: PageBody,
    pub revalidate: Option<Duration>,
}

/// Page generator backed by a content source
pub struct Generator {
    blog: Blog,
    source: Box<dyn ContentSource>,
    renderer: TemplateRenderer,
    i18n: I18n,
    tz: chrono_tz::Tz,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog, source: Box<dyn ContentSource>) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;
        let i18n = I18n::new(&blog.config.language);
        let tz = blog.config.tz();
        tracing::debug!("Using content source: {}", source.name());

        Ok(Self {
            blog: blog.clone(),
            source,
            renderer,
            i18n,
            tz,
        })
    }

    /// The content source pages are generated from
    pub fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }

    /// Revalidate interval of post pages
    pub fn revalidate(&self) -> Duration {
        self.blog.config.revalidate()
    }

    /// Initial load of the post list
    pub async fn initial_posts(&self) -> Result<PostPagination, CmsError> {
        let config = &self.blog.config;
        PostPagination::fetch_first(
            self.source(),
            &config.prismic.document_type,
            config.page_size,
        )
        .await
    }

    /// Page a load-more cursor points to
    pub async fn next_posts(&self, cursor: &str) -> Result<PostPagination, CmsError> {
        PostPagination::fetch_next(self.source(), cursor).await
    }

    /// UIDs of the posts pre-rendered at build time
    pub async fn static_paths(&self) -> Result<Vec<String>, CmsError> {
        let config = &self.blog.config;
        let response = self
            .source
            .get_by_type(&config.prismic.document_type, config.page_size)
            .await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|doc| doc.uid)
            .filter(|uid| !uid.is_empty())
            .collect())
    }

    /// Look up one post, `None` when the CMS does not know it
    pub async fn fetch_post(
        &self,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<Post>, CmsError> {
        let doc = self
            .source
            .get_by_uid(&self.blog.config.prismic.document_type, uid, preview_ref)
            .await?;
        Ok(doc.map(|doc| Post::from_document(uid, doc)))
    }

    /// Fetch and render the post list, loading more through the server endpoint
    pub async fn build_index(&self) -> Result<String> {
        let posts = self.initial_posts().await?;
        tracing::debug!("Index has {} posts", posts.results.len());
        self.render_index(&posts, self.api_next_url(&posts))
    }

    /// Every page of the post list, following cursors from the first one.
    ///
    /// A failing page ends the list early.
    pub async fn list_pages(&self) -> Result<Vec<PostPagination>> {
        let mut pages = vec![self.initial_posts().await?];
        while let Some(cursor) = pages.last().and_then(|p| p.next_page.clone()) {
            match self.next_posts(&cursor).await {
                Ok(next) => pages.push(next),
                Err(e) => {
                    tracing::warn!("Post list stops at page {}: {}", pages.len(), e);
                    break;
                }
            }
        }
        Ok(pages)
    }

    /// Fetch and render a post page, or redirect home when it does not exist
    pub async fn build_post(&self, uid: &str, preview_ref: Option<&str>) -> Result<PageBody> {
        match self.fetch_post(uid, preview_ref).await? {
            Some(post) => Ok(PageBody::Html(self.render_post(&post)?)),
            None => {
                tracing::info!("Post {:?} not found, redirecting home", uid);
                Ok(PageBody::Redirect(url_for(&self.blog.config, "/")))
            }
        }
    }

    /// Build every post from the path enumeration.
    ///
    /// A post that fails to build is skipped; it is generated on demand later.
    pub async fn build_posts(&self) -> Result<Vec<GeneratedPage>> {
        let uids = self.static_paths().await?;
        tracing::info!("Pre-rendering {} posts", uids.len());

        let mut pages = Vec::with_capacity(uids.len());
        for uid in uids {
            let route = post_route(&uid);
            match self.build_post(&uid, None).await {
                Ok(body) => pages.push(GeneratedPage {
                    route,
                    body,
                    revalidate: Some(self.revalidate()),
                }),
                Err(e) => tracing::warn!("Skipping {}: {:#}", route, e),
            }
        }

        Ok(pages)
    }

    /// Generate the index and known posts into the page cache
    pub async fn prerender(&self, cache: &PageCache) -> Result<usize> {
        let index = self.build_index().await?;
        let pages = self.build_posts().await?;
        let now = SystemTime::now();

        cache.store("/", PageBody::Html(index), None, now);
        let count = pages.len() + 1;
        for page in pages {
            cache.store(&page.route, page.body, page.revalidate, now);
        }
        Ok(count)
    }

    /// Generate the static site into the public directory.
    ///
    /// Later pages of the post list are written as JSON files the load more
    /// button fetches, so the output works without the server.
    pub async fn generate(&self) -> Result<Manifest> {
        let public_dir = &self.blog.public_dir;
        fs::create_dir_all(public_dir)?;

        self.write_assets()?;

        let now = SystemTime::now();
        let mut manifest = Manifest::new();

        let lists = self.list_pages().await?;
        let next_url =
            |number: usize| (number < lists.len()).then(|| self.static_page_url(number + 1));

        let index = self.render_index(&lists[0], next_url(1))?;
        self.write_page(&mut manifest, "/", "index.html", &index, None, now)?;

        for (i, list) in lists.iter().enumerate().skip(1) {
            let number = i + 1;
            let file = static_page_file(number);
            let json = serde_json::to_string(&self.list_data(list, next_url(number)))?;
            self.write_page(&mut manifest, &format!("/{}", file), &file, &json, None, now)?;
        }

        for page in self.build_posts().await? {
            let PageBody::Html(html) = &page.body else {
                tracing::debug!("Not writing redirect for {}", page.route);
                continue;
            };
            let Some(file) = output_file(&page.route) else {
                tracing::warn!("Refusing to write route {:?}", page.route);
                continue;
            };
            self.write_page(&mut manifest, &page.route, &file, html, page.revalidate, now)?;
        }

        self.prune(&manifest)?;
        manifest.save(&self.blog.base_dir)?;
        Ok(manifest)
    }

    fn write_page(
        &self,
        manifest: &mut Manifest,
        route: &str,
        file: &str,
        content: &str,
        revalidate: Option<Duration>,
        now: SystemTime,
    ) -> Result<()> {
        let output_path = self.blog.public_dir.join(file);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_path, content)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated: {:?}", output_path);

        manifest.record(route, file, now, revalidate);
        Ok(())
    }

    /// Remove pages written by the previous build that are gone now
    fn prune(&self, manifest: &Manifest) -> Result<()> {
        let previous = Manifest::load(&self.blog.base_dir);
        for file in previous.removed_files(manifest) {
            if !is_safe_relative(file) {
                continue;
            }
            let path = self.blog.public_dir.join(file);
            if path.exists() {
                fs::remove_file(&path)?;
                tracing::info!("Removed: {:?}", path);
                if let Some(parent) = path.parent() {
                    // Only succeeds when the post directory is now empty
                    let _ = fs::remove_dir(parent);
                }
            }
        }
        Ok(())
    }

    fn write_assets(&self) -> Result<()> {
        for (name, _, content) in ASSETS {
            fs::write(self.blog.public_dir.join(name), content)?;
        }
        Ok(())
    }

    /// Render the post list page; `next_url` is where load more fetches from
    pub fn render_index(
        &self,
        posts: &PostPagination,
        next_url: Option<String>,
    ) -> Result<String> {
        let mut context = self.base_context();
        context.insert("posts", &self.list_data(posts, next_url));
        self.renderer.render("index.html", &context)
    }

    /// Render a post page
    pub fn render_post(&self, post: &Post) -> Result<String> {
        let mut context = self.base_context();
        context.insert("post", &self.post_data(post));
        self.renderer.render("post.html", &context)
    }

    /// Render the loading placeholder shown while a post is generated
    pub fn render_fallback(&self) -> Result<String> {
        self.renderer.render("fallback.html", &self.base_context())
    }

    fn base_context(&self) -> tera::Context {
        base_context(
            self.i18n.language(),
            &self.site_data(),
            &self.i18n.ui_strings(),
        )
    }

    fn site_data(&self) -> SiteData {
        let config = &self.blog.config;
        let logo = if config.logo.starts_with("http://") || config.logo.starts_with("https://") {
            config.logo.clone()
        } else {
            url_for(config, &config.logo)
        };
        SiteData {
            title: config.title.clone(),
            root: url_for(config, "/"),
            logo,
            stylesheet: url_for(config, "style.css"),
            script: url_for(config, "load-more.js"),
        }
    }

    /// Template and JSON view of a post list
    pub fn list_data(&self, posts: &PostPagination, next_url: Option<String>) -> ListData {
        ListData {
            results: posts.results.iter().map(|p| self.summary_data(p)).collect(),
            next_page: posts.next_page.as_deref().map(public_cursor),
            next_url,
        }
    }

    /// Server endpoint returning the page after `posts`
    pub fn api_next_url(&self, posts: &PostPagination) -> Option<String> {
        posts.next_page.as_deref().map(|cursor| {
            format!(
                "{}?cursor={}",
                url_for(&self.blog.config, API_POSTS),
                utf8_percent_encode(&public_cursor(cursor), NON_ALPHANUMERIC)
            )
        })
    }

    fn static_page_url(&self, number: usize) -> String {
        url_for(&self.blog.config, &static_page_file(number))
    }

    fn summary_data(&self, post: &PostSummary) -> SummaryData {
        SummaryData {
            uid: post.uid.clone(),
            href: url_for(&self.blog.config, &post_route(&post.uid)),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: post
                .first_publication_date
                .map(|d| post_date(&d, self.tz, &self.i18n)),
            datetime: post.first_publication_date.map(|d| date_xml(&d)),
        }
    }

    fn post_data(&self, post: &Post) -> PostData {
        let description = if post.subtitle.is_empty() {
            let text = post
                .content
                .first()
                .map(|block| as_text(&block.body))
                .unwrap_or_default();
            truncate(text.trim(), DESCRIPTION_LENGTH, None)
        } else {
            post.subtitle.clone()
        };

        PostData {
            title: post.title.clone(),
            author: post.author.clone(),
            banner: post
                .banner
                .as_deref()
                .and_then(safe_url)
                .map(str::to_string),
            date: post
                .first_publication_date
                .map(|d| post_date(&d, self.tz, &self.i18n)),
            datetime: post.first_publication_date.map(|d| date_xml(&d)),
            reading_time: post.reading_time(),
            description,
            blocks: post
                .content
                .iter()
                .map(|block| BlockData {
                    heading: block.heading.clone(),
                    body_html: as_html(&block.body),
                })
                .collect(),
        }
    }
}

/// JSON file holding one page of the post list, 1-based
fn static_page_file(number: usize) -> String {
    format!("{}/{}.json", API_POSTS, number)
}

/// Output file of a route, relative to the public dir.
///
/// Routes are percent-decoded since static servers look files up by the
/// decoded request path.
fn output_file(route: &str) -> Option<String> {
    let path = percent_decode_str(route.trim_matches('/')).decode_utf8().ok()?;
    if path.is_empty() {
        return Some("index.html".to_string());
    }
    let file = format!("{}/index.html", path);
    is_safe_relative(&file).then_some(file)
}

/// Relative path without parent or current directory components
fn is_safe_relative(path: &str) -> bool {
    !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}
