//! List posts known to the CMS

use anyhow::Result;

use crate::cms::ContentSource;
use crate::config::SiteConfig;
use crate::content::PostPagination;
use crate::helpers::{full_url_for, post_route, url_for};
use crate::Blog;

/// Print the first page of posts, or every page when `all` is set
pub async fn run(blog: &Blog, all: bool) -> Result<()> {
    let source = blog.source()?;
    let posts = collect(source.as_ref(), &blog.config, all).await?;

    println!("Posts ({}):", posts.results.len());
    for post in &posts.results {
        let date = post
            .first_publication_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!("  {} - {} [{}]", date, post.title, link(&blog.config, &post.uid));
    }
    if posts.has_more() {
        println!("More posts available, use --all to list them.");
    }

    Ok(())
}

/// Fetch the first page, then follow cursors until exhausted when `all` is set
pub async fn collect(
    source: &dyn ContentSource,
    config: &SiteConfig,
    all: bool,
) -> Result<PostPagination> {
    let mut posts =
        PostPagination::fetch_first(source, &config.prismic.document_type, config.page_size)
            .await?;
    if all {
        while posts.has_more() {
            posts.load_more(source).await?;
        }
    }
    Ok(posts)
}

fn link(config: &SiteConfig, uid: &str) -> String {
    let route = post_route(uid);
    if config.url.is_empty() {
        url_for(config, &route)
    } else {
        full_url_for(config, &route)
    }
}
