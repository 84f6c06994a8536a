//! Initialize a new blog

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::CONFIG_FILE;

/// Default configuration written by `init`
const DEFAULT_CONFIG: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
language: pt-BR
timezone: UTC

# URL
url: http://localhost:3000
root: /
logo: /Logo.svg

# Directory
public_dir: public

# Content
## PRISMIC_API_ENDPOINT and PRISMIC_ACCESS_TOKEN override these values
prismic:
  endpoint: https://your-repository.cdn.prismic.io/api/v2
  access_token:
  document_type: posts
  timeout_secs: 30

## Serve documents from a local JSON file instead of Prismic
# fixture: posts.json

# Pagination
page_size: 2

# Seconds before a post page is regenerated
revalidate_secs: 300
"#;

/// Initialize a new blog in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{:?} already exists, refusing to overwrite it", config_path);
    }

    fs::create_dir_all(target_dir)?;
    fs::write(&config_path, DEFAULT_CONFIG)?;
    tracing::debug!("Wrote {:?}", config_path);

    Ok(())
}
