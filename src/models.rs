use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::slug::generate_url_seo;

pub const MORE_MARKER: &str = "<!--more-->";

#[derive(Deserialize, Debug, Clone)]
pub struct FrontMatter {
    pub id: u32,
    pub title: String,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u32,
    pub title: String,
    pub created: DateTime<FixedOffset>,
    pub text: String,
}

impl Post {
    pub fn slug(&self) -> String {
        generate_url_seo(&self.title)
    }

    /// Text before the first `<!--more-->`, or the whole text.
    pub fn excerpt(&self) -> &str {
        match self.text.find(MORE_MARKER) {
            Some(at) => &self.text[..at],
            None => &self.text,
        }
    }
}

/// Newest first.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created.cmp(&a.created));
}
