//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::cache::Manifest;
use crate::Blog;

/// Clean the public directory and the build manifest
pub fn run(blog: &Blog) -> Result<()> {
    if blog.public_dir.exists() {
        fs::remove_dir_all(&blog.public_dir)?;
        tracing::info!("Deleted: {:?}", blog.public_dir);
    }

    let manifest_dir = Manifest::dir(&blog.base_dir);
    if manifest_dir.exists() {
        fs::remove_dir_all(&manifest_dir)?;
        tracing::info!("Deleted: {:?}", manifest_dir);
    }

    Ok(())
}
