use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use htmlescape::encode_minimal;
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};
use tracing::{debug, warn};

pub const DEFAULT_LANGUAGES: [&str; 2] = ["java", "python"];

/// Renders fenced code blocks, highlighting the allow-listed languages.
///
/// Highlighted markup is a function of `(language, code)` only and is memoised on
/// that pair, so re-rendering an unchanged block hands back the same string.
pub struct CodeHighlighter {
    syntaxes: SyntaxSet,
    languages: Vec<String>,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl CodeHighlighter {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            languages: languages
                .into_iter()
                .map(|language| language.into().to_ascii_lowercase())
                .collect(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self, language: &str) -> bool {
        self.languages
            .iter()
            .any(|enabled| enabled.eq_ignore_ascii_case(language))
    }

    /// The full `<pre><code>` element for a block.
    pub fn render_block(&self, language: Option<&str>, code: &str) -> String {
        let Some(language) = language.filter(|language| !language.is_empty()) else {
            return format!("<pre><code>{}</code></pre>\n", encode_minimal(code));
        };

        let class = encode_minimal(&format!("language-{language}"));
        match self.highlight(language, code) {
            Some(spans) => format!("<pre><code class=\"{class} hljs\">{spans}</code></pre>\n"),
            None => format!(
                "<pre><code class=\"{class}\">{}</code></pre>\n",
                encode_minimal(code)
            ),
        }
    }

    /// Highlighted inner markup, or `None` when the language isn't enabled or known.
    pub fn highlight(&self, language: &str, code: &str) -> Option<String> {
        if !self.is_enabled(language) {
            return None;
        }

        let key = (language.to_ascii_lowercase(), code.to_string());
        if let Some(hit) = self.lock_cache().get(&key) {
            return Some(hit.clone());
        }

        debug!(language, bytes = code.len(), "highlight cache miss");
        let spans = self.highlight_uncached(&key.0, code)?;
        self.lock_cache().insert(key, spans.clone());
        Some(spans)
    }

    pub fn cached_blocks(&self) -> usize {
        self.lock_cache().len()
    }

    fn highlight_uncached(&self, language: &str, code: &str) -> Option<String> {
        let syntax = self.syntaxes.find_syntax_by_token(language)?;
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                warn!("Failed to highlight {} block: {}", language, e);
                return None;
            }
        }
        Some(generator.finalize())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CodeHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES)
    }
}
