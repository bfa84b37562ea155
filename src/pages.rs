use chrono::{DateTime, FixedOffset};
use htmlescape::encode_minimal;
use serde::Serialize;

use crate::config::SiteConfig;
use crate::content_loader::SiteContent;
use crate::markdown::MarkdownRenderer;
use crate::models::Post;

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

const DESCRIPTION_CHARS: usize = 160;

/// A page body plus what goes into the layout's `<head>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub title: String,
    pub head: String,
    pub body: String,
}

pub fn render_with_layout(content: &SiteContent, page: &Page, is_development: bool) -> String {
    let mut list_items = String::new();
    for post in &content.posts {
        list_items.push_str(&format!(
            "<li><a href=\"/posts/{}\" class=\"text-blue no-underline\">{}</a></li>",
            post.slug(),
            encode_minimal(&post.title)
        ));
    }

    let mut html = content
        .layout_html
        .replace("{{ title }}", &encode_minimal(&page.title))
        .replace("{{ head }}", &page.head)
        .replace("{{ banner }}", &content.banner_html)
        .replace("{{ posts }}", &list_items)
        .replace("{{ content }}", &page.body);

    if is_development {
        html = html.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    html
}

pub fn format_created(created: &DateTime<FixedOffset>) -> String {
    created.format("%A, %d/%m/%Y %-H:%-M").to_string()
}

pub fn home_page(content: &SiteContent, config: &SiteConfig) -> Page {
    Page {
        title: config.site_name.clone(),
        head: String::new(),
        body: content.home_html.clone(),
    }
}

pub fn blog_page(content: &SiteContent, config: &SiteConfig, renderer: &MarkdownRenderer) -> Page {
    let body = content
        .posts
        .iter()
        .map(|post| post_summary(post, renderer))
        .collect();

    Page {
        title: format!("Blog | {}", config.site_name),
        head: String::new(),
        body,
    }
}

fn post_summary(post: &Post, renderer: &MarkdownRenderer) -> String {
    let href = format!("/posts/{}", post.slug());
    format!(
        "<article class=\"post-summary\">\
         <h1 class=\"ui header\"><a href=\"{href}\">{title}</a></h1>\
         <small>{date}</small>\
         <div class=\"post\">{excerpt}</div>\
         <p class=\"read-more\"><a class=\"ui button\" href=\"{href}\">Read More...</a></p>\
         <hr class=\"divider\" />\
         </article>\n",
        title = encode_minimal(&post.title),
        date = format_created(&post.created),
        excerpt = renderer.render_markdown_to_html(post.excerpt()),
    )
}

pub fn post_page(post: &Post, config: &SiteConfig, renderer: &MarkdownRenderer) -> Page {
    let description: String = post
        .excerpt()
        .trim()
        .chars()
        .take(DESCRIPTION_CHARS)
        .collect();
    let head = format!(
        "<link rel=\"canonical\" href=\"{}\" /><meta name=\"description\" content=\"{}\" />",
        encode_minimal(&config.post_url(&post.slug())),
        encode_minimal(&description)
    );
    let body = format!(
        "<article>\
         <h1 class=\"ui header\">{title}</h1>\
         <small>{date}</small>\
         <div class=\"post\">{text}</div>\
         {comments}\
         </article>\n",
        title = encode_minimal(&post.title),
        date = format_created(&post.created),
        text = renderer.render_markdown_to_html(&post.text),
        comments = comments_section(config, post),
    );

    Page {
        title: format!("{} | Blog | {}", post.title, config.site_name),
        head,
        body,
    }
}

pub fn not_found_page(content: &SiteContent, config: &SiteConfig, slug: &str) -> Page {
    Page {
        title: format!("Not Found | {}", config.site_name),
        head: String::new(),
        body: content
            .not_found_html
            .replace("{{slug}}", &encode_minimal(slug)),
    }
}

/// What the comment service keys a thread on.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DisqusThread {
    pub url: String,
    pub identifier: String,
    pub title: String,
}

impl DisqusThread {
    pub fn for_post(config: &SiteConfig, post: &Post) -> Self {
        let slug = post.slug();
        Self {
            url: config.post_url(&slug),
            identifier: slug,
            title: post.title.clone(),
        }
    }
}

fn comments_section(config: &SiteConfig, post: &Post) -> String {
    if config.disqus_shortname.is_empty() {
        return String::new();
    }

    let thread = DisqusThread::for_post(config, post);
    // `<` is escaped so a title can't close the script element.
    let thread_json = serde_json::to_string(&thread)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c");
    let shortname = encode_minimal(&config.disqus_shortname);

    format!(
        r#"<section id="comments">
<span class="disqus-comment-count" data-disqus-identifier="{identifier}" data-disqus-url="{url}">Comments</span>
<div id="disqus_thread"></div>
<script>
    var disqus_config = function () {{
        var thread = {thread_json};
        this.page.url = thread.url;
        this.page.identifier = thread.identifier;
        this.page.title = thread.title;
    }};
    (function () {{
        var d = document, s = d.createElement("script");
        s.src = "https://{shortname}.disqus.com/embed.js";
        s.setAttribute("data-timestamp", +new Date());
        (d.head || d.body).appendChild(s);
    }})();
</script>
<script id="dsq-count-scr" src="https://{shortname}.disqus.com/count.js" async></script>
</section>"#,
        identifier = encode_minimal(&thread.identifier),
        url = encode_minimal(&thread.url),
    )
}
