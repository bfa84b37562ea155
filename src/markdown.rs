use std::borrow::Cow;

use htmlescape::encode_minimal;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::highlight::CodeHighlighter;
use crate::image_size::{self, ImageSize};
use crate::slug::generate_url_seo;

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Markdown to HTML with sized images, anchored headings and highlighted code.
pub struct MarkdownRenderer {
    highlighter: CodeHighlighter,
}

impl MarkdownRenderer {
    pub fn new(highlighter: CodeHighlighter) -> Self {
        Self { highlighter }
    }

    pub fn highlighter(&self) -> &CodeHighlighter {
        &self.highlighter
    }

    pub fn render_markdown_to_html(&self, markdown: &str) -> String {
        let source = image_size::preprocess(markdown);
        let events: Vec<Event<'_>> = Parser::new_ext(&source, markdown_options())
            .map(restore_literal)
            .collect();
        let rendered = self.rewrite(&events);

        let mut html_out = String::new();
        html::push_html(&mut html_out, rendered.into_iter());
        html_out
    }

    fn rewrite<'a>(&self, events: &[Event<'a>]) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut heading_anchored = false;
        let mut i = 0;

        while i < events.len() {
            match &events[i] {
                Event::Start(Tag::Image {
                    dest_url, title, ..
                }) => {
                    if let (Some(end), Some((src, size))) = (
                        closing_index(events, i),
                        image_size::split_sized_url(dest_url),
                    ) {
                        let alt = plain_text(&events[i + 1..end]);
                        out.push(Event::InlineHtml(CowStr::from(sized_image_html(
                            src, &alt, title, size,
                        ))));
                        i = end + 1;
                        continue;
                    }
                    out.push(events[i].clone());
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    if let Some(end) = closing_index(events, i) {
                        let language = match kind {
                            CodeBlockKind::Fenced(info) => info.split_whitespace().next(),
                            CodeBlockKind::Indented => None,
                        };
                        let code = plain_text(&events[i + 1..end]);
                        out.push(Event::Html(CowStr::from(
                            self.highlighter.render_block(language, &code),
                        )));
                        i = end + 1;
                        continue;
                    }
                    out.push(events[i].clone());
                }
                Event::Start(Tag::Heading {
                    level,
                    classes,
                    attrs,
                    ..
                }) => {
                    let end = closing_index(events, i).unwrap_or(events.len());
                    let anchor = generate_url_seo(&plain_text(&events[i + 1..end]));
                    heading_anchored = !anchor.is_empty();
                    if !heading_anchored {
                        out.push(events[i].clone());
                        i += 1;
                        continue;
                    }
                    out.push(Event::Html(CowStr::from(format!(
                        "<a href=\"#{0}\" name=\"{0}\">",
                        encode_minimal(&anchor)
                    ))));
                    out.push(Event::Start(Tag::Heading {
                        level: *level,
                        id: Some(CowStr::from(anchor)),
                        classes: classes.clone(),
                        attrs: attrs.clone(),
                    }));
                }
                Event::End(TagEnd::Heading(level)) => {
                    out.push(Event::End(TagEnd::Heading(*level)));
                    if heading_anchored {
                        out.push(Event::Html(CowStr::Borrowed("</a>\n")));
                        heading_anchored = false;
                    }
                }
                other => out.push(other.clone()),
            }
            i += 1;
        }

        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(CodeHighlighter::default())
    }
}

/// Puts back any `=WxH` annotation that was folded into literal text rather than
/// an image destination.
fn restore_literal(event: Event<'_>) -> Event<'_> {
    fn restored(text: CowStr<'_>) -> CowStr<'_> {
        match image_size::restore(&text) {
            Cow::Borrowed(_) => text,
            Cow::Owned(owned) => CowStr::from(owned),
        }
    }

    match event {
        Event::Text(text) => Event::Text(restored(text)),
        Event::Code(code) => Event::Code(restored(code)),
        Event::Html(html) => Event::Html(restored(html)),
        Event::InlineHtml(html) => Event::InlineHtml(restored(html)),
        other => other,
    }
}

/// Index of the `End` event that closes the `Start` at `start`.
fn closing_index(events: &[Event<'_>], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, event) in events[start..].iter().enumerate() {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

fn sized_image_html(src: &str, alt: &str, title: &str, size: ImageSize) -> String {
    let mut tag = format!(
        "<img src=\"{}\" alt=\"{}\"",
        encode_minimal(src),
        encode_minimal(alt)
    );
    if !title.is_empty() {
        tag.push_str(&format!(" title=\"{}\"", encode_minimal(title)));
    }
    if let Some(width) = size.width {
        tag.push_str(&format!(" width=\"{width}\""));
    }
    if let Some(height) = size.height {
        tag.push_str(&format!(" height=\"{height}\""));
    }
    tag.push_str(" />");
    tag
}

#[cfg(test)]
mod tests {
    use super::MarkdownRenderer;

    fn render(markdown: &str) -> String {
        MarkdownRenderer::default().render_markdown_to_html(markdown)
    }

    #[test]
    fn sized_image_gets_width_and_height() {
        let output = render("![alt](http://x/y.png =100x50)");
        assert!(output.contains(
            "<img src=\"http://x/y.png\" alt=\"alt\" width=\"100\" height=\"50\" />"
        ));
        assert!(!output.contains("33B2BF251EFD"));
    }

    #[test]
    fn width_only_image_omits_height() {
        let output = render("![alt](http://x/y.png =100x)");
        assert!(output.contains("<img src=\"http://x/y.png\" alt=\"alt\" width=\"100\" />"));
        assert!(!output.contains("height="));
    }

    #[test]
    fn height_only_image_omits_width() {
        let output = render("![logo](logo.svg =x32)");
        assert!(output.contains("<img src=\"logo.svg\" alt=\"logo\" height=\"32\" />"));
    }

    #[test]
    fn plain_image_has_no_dimensions() {
        let output = render("![alt](http://x/y.png)");
        assert!(output.contains("<img src=\"http://x/y.png\" alt=\"alt\" />"));
        assert!(!output.contains("width="));
        assert!(!output.contains("height="));
    }

    #[test]
    fn malformed_size_falls_back_to_text() {
        let output = render("![alt](http://x/y.png =big)");
        assert!(!output.contains("<img"));
        assert!(output.contains("=big"));
    }

    #[test]
    fn heading_is_wrapped_in_its_own_anchor() {
        let output = render("## My Section");
        assert_eq!(
            output,
            "<a href=\"#my-section\" name=\"my-section\">\n<h2 id=\"my-section\">My Section</h2>\n</a>\n"
        );
    }

    #[test]
    fn heading_anchor_uses_slug_rules() {
        let output = render("### 1. Path Finding using *DFS*");
        assert!(output.contains("name=\"1-path-finding-using-dfs\""));
        assert!(output.contains("<h3 id=\"1-path-finding-using-dfs\">"));
        assert!(output.contains("<em>DFS</em>"));
    }

    #[test]
    fn empty_heading_gets_no_anchor() {
        let output = render("#\n\n## Next");
        assert!(output.contains("<h1></h1>"));
        assert!(!output.contains("name=\"\""));
        assert!(!output.contains("href=\"#\""));
        assert_eq!(output.matches("</a>").count(), 1);
        assert!(output.contains("<h2 id=\"next\">Next</h2>"));
    }

    #[test]
    fn size_annotation_inside_code_is_left_verbatim() {
        let output = render("Use `![a](b.png =10x20)` syntax.\n\n```\n![a](b.png =10x20)\n```\n");
        assert!(output.contains("<code>![a](b.png =10x20)</code>"));
        assert!(output.contains("<pre><code>![a](b.png =10x20)\n</code></pre>"));
        assert!(!output.contains("33B2BF251EFD"));
        assert!(!output.contains("<img"));
    }

    #[test]
    fn size_annotation_inside_highlighted_code_is_left_verbatim() {
        let output = render("```python\nurl = \"![a](b.png =10x20)\"\n```\n");
        assert!(output.contains("b.png =10x20"));
        assert!(!output.contains("33B2BF251EFD"));
    }

    #[test]
    fn fenced_code_goes_through_highlighter() {
        let output = render("```python\nprint('hi')\n```\n");
        assert!(output.contains("<pre><code class=\"language-python hljs\">"));
        assert!(output.contains("<span class=\""));
    }

    #[test]
    fn code_without_language_has_no_class() {
        let output = render("```\nplain <text>\n```\n");
        assert!(output.contains("<pre><code>plain &lt;text&gt;\n</code></pre>"));

        let output = render("    indented\n");
        assert!(output.contains("<pre><code>indented\n</code></pre>"));
    }

    #[test]
    fn rendering_twice_is_stable() {
        let renderer = MarkdownRenderer::default();
        let source = "# Title\n\n```java\nclass A {}\n```\n";
        let first = renderer.render_markdown_to_html(source);
        let second = renderer.render_markdown_to_html(source);
        assert_eq!(first, second);
        assert_eq!(renderer.highlighter().cached_blocks(), 1);

        renderer.render_markdown_to_html("```java\nclass B {}\n```\n");
        assert_eq!(renderer.highlighter().cached_blocks(), 2);
    }

    #[test]
    fn renders_multipath_routing_post() {
        let post = include_str!("../content/posts/multipath-routing.md");
        let output = render(post);
        assert!(output.contains("href=\"#1-path-finding-using-dfs\""));
        assert!(output.contains("<h3 id=\"2-path-cost-calculation\">"));
        assert!(output.contains("output.gif\" alt=\"Multipath routing\" width=\"600\" />"));
        assert!(output.contains("width=\"480\" height=\"320\""));
        assert!(output.contains("<pre><code class=\"language-python hljs\">"));
    }

    #[test]
    fn standard_markdown_still_renders() {
        let output = render("Some *emphasis*, a [link](http://a/) and ~~gone~~.\n\n- one\n- two\n");
        assert!(output.contains("<em>emphasis</em>"));
        assert!(output.contains("<a href=\"http://a/\">link</a>"));
        assert!(output.contains("<del>gone</del>"));
        assert!(output.contains("<li>one</li>"));
    }
}
