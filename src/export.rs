//! Writes the whole site out as static files.
//!
//! Directory names for posts are the *decoded* slug, since static hosts decode the
//! request path before looking up the file.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use tokio::fs;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::content_loader::SiteContent;
use crate::error::{Error, Result};
use crate::markdown::MarkdownRenderer;
use crate::pages::{self, Page};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub pages: usize,
    pub skipped_posts: usize,
    pub static_files: usize,
}

pub async fn export_site(
    config: &SiteConfig,
    content: &SiteContent,
    renderer: &MarkdownRenderer,
    out_dir: &Path,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();

    write_page(
        content,
        &pages::home_page(content, config),
        &out_dir.join("index.html"),
    )
    .await?;
    write_page(
        content,
        &pages::blog_page(content, config, renderer),
        &out_dir.join("blog").join("index.html"),
    )
    .await?;
    write_page(
        content,
        &pages::not_found_page(content, config, ""),
        &out_dir.join("404.html"),
    )
    .await?;
    summary.pages += 3;

    // Posts are newest first, so the first post to claim a slug is the one the
    // preview serves.
    let mut written = HashSet::new();
    for post in &content.posts {
        let slug = post.slug();
        let Some(dir) = post_dir(&slug) else {
            warn!(
                id = post.id,
                "Slug {:?} can't be used as a directory, skipping", slug
            );
            summary.skipped_posts += 1;
            continue;
        };
        if !written.insert(dir.clone()) {
            warn!(
                id = post.id,
                "Slug {:?} already exported for a newer post, skipping", slug
            );
            summary.skipped_posts += 1;
            continue;
        }
        let page = pages::post_page(post, config, renderer);
        write_page(
            content,
            &page,
            &out_dir.join("posts").join(dir).join("index.html"),
        )
        .await?;
        summary.pages += 1;
    }

    let static_src = config.content_dir.join("static");
    let has_static = fs::try_exists(&static_src)
        .await
        .map_err(|e| Error::io(&static_src, e))?;
    if has_static {
        summary.static_files = copy_dir(&static_src, &out_dir.join("static")).await?;
    }

    info!(
        pages = summary.pages,
        static_files = summary.static_files,
        "Site exported to {}",
        out_dir.display()
    );
    Ok(summary)
}

/// Relative directory for a post, or `None` if the decoded slug would escape `posts/`.
fn post_dir(slug: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(slug).decode_utf8_lossy();
    let path = PathBuf::from(decoded.as_ref());
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

async fn write_page(content: &SiteContent, page: &Page, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    let html = pages::render_with_layout(content, page, false);
    fs::write(path, html).await.map_err(|e| Error::io(path, e))
}

async fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await.map_err(|e| Error::io(&to, e))?;
        let mut entries = fs::read_dir(&from).await.map_err(|e| Error::io(&from, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&from, e))? {
            let path = entry.path();
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().await.map_err(|e| Error::io(&path, e))?;
            if file_type.is_dir() {
                pending.push((path, target));
            } else {
                fs::copy(&path, &target).await.map_err(|e| Error::io(&path, e))?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}
