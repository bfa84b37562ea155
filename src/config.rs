use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::highlight::DEFAULT_LANGUAGES;

/// Site-wide settings, read from `site.toml` and then overridden from the environment.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub site_name: String,
    /// Base of every canonical post link: `{site_url}/{slug}`.
    pub site_url: String,
    /// Comments are left out when empty.
    pub disqus_shortname: String,
    pub content_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub highlight_languages: Vec<String>,
    #[serde(skip)]
    pub is_development: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Portfolio".to_string(),
            site_url: "http://localhost:8080/posts".to_string(),
            disqus_shortname: String::new(),
            content_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("out"),
            port: 8080,
            highlight_languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            is_development: false,
        }
    }
}

impl SiteConfig {
    /// Reads `path` if it exists, otherwise starts from the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).map_err(|source| Error::Config {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_file(path)?.with_env(|key| std::env::var(key).ok()))
    }

    /// Applies `SITE_URL`, `SITE_NAME`, `DISQUS_SHORTNAME`, `CONTENT_DIR`, `PORT` and `RUST_ENV`.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("SITE_URL") {
            self.site_url = url;
        }
        if let Some(name) = var("SITE_NAME") {
            self.site_name = name;
        }
        if let Some(shortname) = var("DISQUS_SHORTNAME") {
            self.disqus_shortname = shortname;
        }
        if let Some(dir) = var("CONTENT_DIR") {
            self.content_dir = PathBuf::from(dir);
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        self.is_development = var("RUST_ENV").is_some_and(|v| v == "development");
        self
    }

    pub fn post_url(&self, slug: &str) -> String {
        format!("{}/{}", self.site_url.trim_end_matches('/'), slug)
    }
}
