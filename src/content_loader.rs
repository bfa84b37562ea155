use std::collections::HashSet;
use std::path::Path;

use chrono::DateTime;
use gray_matter::{engine::YAML, Matter};
use serde::Deserialize;
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::markdown::MarkdownRenderer;
use crate::models::{sort_posts, FrontMatter, Post};
use crate::state::AppState;

/// Everything read from the content directory, swapped as a whole on reload.
#[derive(Debug, Clone)]
pub struct SiteContent {
    pub layout_html: String,
    pub banner_html: String,
    pub home_html: String,
    pub not_found_html: String, // supports {{slug}} placeholder
    pub posts: Vec<Post>,
}

impl SiteContent {
    pub fn find_post(&self, requested: &str) -> Option<&Post> {
        self.posts
            .iter()
            .find(|post| crate::slug::slug_matches(&post.slug(), requested))
    }
}

#[derive(Deserialize)]
struct AnyMatter {}

async fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))
}

pub async fn load_content(
    config: &SiteConfig,
    renderer: &MarkdownRenderer,
) -> Result<SiteContent> {
    let dir = &config.content_dir;
    let banner_html = read(&dir.join("banner.html")).await?;
    let layout_html = read(&dir.join("layout.html")).await?;
    let not_found_html = read(&dir.join("not_found.html")).await?;

    let home_md = read(&dir.join("home.md")).await?;
    let home_body = match Matter::<YAML>::new().parse::<AnyMatter>(&home_md) {
        Ok(parsed) => parsed.content,
        Err(e) => {
            warn!("Ignoring front matter in home.md: {}", e);
            home_md
        }
    };
    let home_html = renderer.render_markdown_to_html(&home_body);

    let posts = load_posts(&dir.join("posts")).await?;
    info!(posts = posts.len(), "Content loaded from {}", dir.display());

    Ok(SiteContent {
        layout_html,
        banner_html,
        home_html,
        not_found_html,
        posts,
    })
}

/// Reads every `*.md` post in `dir`, newest first. Posts that can't be read or parsed
/// are skipped.
pub async fn load_posts(dir: &Path) -> Result<Vec<Post>> {
    let mut posts: Vec<Post> = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "md") {
            let parsed = match read(&path).await {
                Ok(file_content) => parse_post(&path, &file_content),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(post) => posts.push(post),
                Err(e) => error!("Skipping post: {}", e),
            }
        }
    }

    sort_posts(&mut posts);
    warn_on_duplicate_slugs(&posts);
    Ok(posts)
}

pub fn parse_post(path: &Path, file_content: &str) -> Result<Post> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(file_content)
        .map_err(|e| Error::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let front_matter = parsed.data.ok_or_else(|| Error::FrontMatter {
        path: path.to_path_buf(),
        message: "no front matter block".to_string(),
    })?;
    let created =
        DateTime::parse_from_rfc3339(&front_matter.created).map_err(|source| Error::Timestamp {
            path: path.to_path_buf(),
            value: front_matter.created.clone(),
            source,
        })?;

    Ok(Post {
        id: front_matter.id,
        title: front_matter.title,
        created,
        text: parsed.content,
    })
}

fn warn_on_duplicate_slugs(posts: &[Post]) {
    let mut seen = HashSet::new();
    for post in posts {
        let slug = post.slug();
        if !seen.insert(slug.clone()) {
            warn!(
                id = post.id,
                "Duplicate slug {}, only the newest post is reachable", slug
            );
        }
    }
}

pub async fn reload_content(app_state: &AppState) {
    info!("Reloading application content...");
    match load_content(&app_state.config, &app_state.renderer).await {
        Ok(content) => {
            *app_state.content.write().await = content;
            info!("Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn post_file(id: u32, title: &str, created: &str, body: &str) -> String {
        format!("---\nid: {id}\ntitle: \"{title}\"\ncreated: \"{created}\"\n---\n{body}")
    }

    pub(crate) fn write_site(dir: &Path) {
        std::fs::create_dir_all(dir.join("posts")).unwrap();
        std::fs::create_dir_all(dir.join("static")).unwrap();
        std::fs::write(
            dir.join("layout.html"),
            concat!(
                "<html><head><title>{{ title }}</title>{{ head }}</head>",
                "<body>{{ banner }}<ul>{{ posts }}</ul><main>{{ content }}</main></body></html>",
            ),
        )
        .unwrap();
        std::fs::write(dir.join("banner.html"), "<header>banner</header>").unwrap();
        std::fs::write(dir.join("not_found.html"), "<p>No post called {{slug}}</p>").unwrap();
        std::fs::write(dir.join("home.md"), "---\ntitle: Home\n---\n# About Me\n").unwrap();
        std::fs::write(dir.join("static/style.css"), "body {}").unwrap();
        std::fs::write(
            dir.join("posts/older.md"),
            post_file(
                1,
                "Hello World.",
                "2018-01-13T09:44:00+07:00",
                "First post.\n\n<!--more-->\n\nThe rest.\n",
            ),
        )
        .unwrap();
        std::fs::write(
            dir.join("posts/newer.md"),
            post_file(
                2,
                "Routing: Part 2",
                "2019-03-02T20:15:00+07:00",
                "## Setup\n\n![topology](/static/topo.png =640x)\n",
            ),
        )
        .unwrap();
        std::fs::write(dir.join("posts/notes.txt"), "not a post").unwrap();
    }

    #[test]
    fn parses_front_matter_and_body() {
        let post = parse_post(
            &PathBuf::from("a.md"),
            &post_file(3, "Multipath Routing", "2018-01-13T09:44:00+07:00", "Body text\n"),
        )
        .unwrap();
        assert_eq!(post.id, 3);
        assert_eq!(post.title, "Multipath Routing");
        assert_eq!(post.created.to_rfc3339(), "2018-01-13T09:44:00+07:00");
        assert!(post.text.contains("Body text"));
    }

    #[test]
    fn rejects_bad_timestamp() {
        let result = parse_post(
            &PathBuf::from("a.md"),
            "---\nid: 3\ntitle: T\ncreated: \"last tuesday\"\n---\nBody\n",
        );
        assert!(matches!(result, Err(Error::Timestamp { .. })));
    }

    #[test]
    fn rejects_missing_front_matter() {
        let result = parse_post(&PathBuf::from("a.md"), "Just text\n");
        assert!(matches!(result, Err(Error::FrontMatter { .. })));
    }

    #[tokio::test]
    async fn loads_site_and_orders_posts() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        std::fs::write(dir.path().join("posts/broken.md"), "---\nid: x\n---\n").unwrap();

        let config = SiteConfig {
            content_dir: dir.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let content = load_content(&config, &MarkdownRenderer::default())
            .await
            .unwrap();

        let titles: Vec<&str> = content.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Routing: Part 2", "Hello World."]);
        assert!(content.home_html.contains("name=\"about-me\""));
        assert!(!content.home_html.contains("title: Home"));
        assert!(content.find_post("routing:-part-2").is_some());
        assert!(content.find_post("hello-world").is_some());
        assert!(content.find_post("missing").is_none());
    }

    #[tokio::test]
    async fn unreadable_post_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let mut latin1 = b"---\nid: 9\ntitle: Caf".to_vec();
        latin1.extend_from_slice(&[0xE9]);
        latin1.extend_from_slice(b"\ncreated: \"2020-01-01T00:00:00Z\"\n---\nBody\n");
        std::fs::write(dir.path().join("posts/latin1.md"), latin1).unwrap();

        let config = SiteConfig {
            content_dir: dir.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let content = load_content(&config, &MarkdownRenderer::default())
            .await
            .unwrap();

        let ids: Vec<u32> = content.posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn duplicate_slug_resolves_to_newest_post() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        write_same_title_posts(dir.path());

        let config = SiteConfig {
            content_dir: dir.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let content = load_content(&config, &MarkdownRenderer::default())
            .await
            .unwrap();

        let post = content.find_post("same-title").unwrap();
        assert_eq!(post.id, 11);
        assert!(post.text.contains("NEW BODY"));
    }

    pub(crate) fn write_same_title_posts(dir: &Path) {
        std::fs::write(
            dir.join("posts/same-old.md"),
            post_file(10, "Same Title", "2020-01-01T00:00:00Z", "OLD BODY\n"),
        )
        .unwrap();
        std::fs::write(
            dir.join("posts/same-new.md"),
            post_file(11, "Same Title", "2021-01-01T00:00:00Z", "NEW BODY\n"),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn missing_layout_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig {
            content_dir: dir.path().to_path_buf(),
            ..SiteConfig::default()
        };
        let result = load_content(&config, &MarkdownRenderer::default()).await;
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
