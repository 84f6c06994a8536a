//! Generate static files

use anyhow::Result;

use crate::generator::Generator;
use crate::Blog;

/// Generate the static site into the public directory
pub async fn run(blog: &Blog) -> Result<()> {
    let start = std::time::Instant::now();

    let generator = Generator::new(blog, blog.source()?)?;
    let manifest = generator.generate().await?;

    let duration = start.elapsed();
    tracing::info!(
        "Generated {} pages in {:.2}s",
        manifest.pages.len(),
        duration.as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;

    const FIXTURE: &str = r#"[
        {
            "id": "A",
            "uid": "primeiro-post",
            "type": "posts",
            "first_publication_date": "2021-03-25T19:25:28+0000",
            "data": {
                "title": "Primeiro post",
                "subtitle": "Um subtítulo",
                "author": "Ana",
                "banner": { "url": null },
                "content": [
                    { "heading": "Intro", "body": [{ "type": "paragraph", "text": "Olá mundo", "spans": [] }] }
                ]
            }
        },
        { "id": "B", "type": "posts", "data": { "title": "Sem uid" } }
    ]"#;

    #[tokio::test]
    async fn test_generate_from_fixture() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("posts.json"), FIXTURE).unwrap();
        let config = SiteConfig {
            fixture: Some("posts.json".to_string()),
            ..SiteConfig::default()
        };
        let blog = Blog::with_config(dir.path(), config);

        run(&blog).await.unwrap();

        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert!(index.contains("Primeiro post"));
        assert!(!index.contains("Sem uid"));
        assert!(!index.contains(r#"id="load-more""#));

        let post =
            fs::read_to_string(blog.public_dir.join("post/primeiro-post/index.html")).unwrap();
        assert!(post.contains("<p>Olá mundo</p>"));
        assert!(!post.contains(r#"class="banner""#));
    }

    #[tokio::test]
    async fn test_generate_without_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        assert!(run(&blog).await.is_err());
    }
}
