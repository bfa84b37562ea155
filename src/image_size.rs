//! `![alt](url =WxH)` support.
//!
//! Standard markdown has no slot for image dimensions, and a parser rejects the
//! `=WxH` suffix outright. Before parsing, the suffix is folded into the URL behind
//! [`SIZE_SENTINEL`]; after parsing, [`split_sized_url`] pulls it back out.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

pub const SIZE_SENTINEL: &str = "_33B2BF251EFD_";

static SIZE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!\[[^\]]*\]\([^)\s]+) =([0-9]+x|x[0-9]+|[0-9]+x[0-9]+)\)")
        .expect("size annotation pattern is valid")
});

static SIZE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{}([0-9]+x|x[0-9]+|[0-9]+x[0-9]+)$",
        regex::escape(SIZE_SENTINEL)
    ))
    .expect("size suffix pattern is valid")
});

static FOLDED_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{}([0-9]+x|x[0-9]+|[0-9]+x[0-9]+)",
        regex::escape(SIZE_SENTINEL)
    ))
    .expect("folded size pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageSize {
    /// Parses `NxM`, `Nx` or `xM`.
    fn parse(spec: &str) -> Option<Self> {
        let (width, height) = spec.split_once('x')?;
        Some(Self {
            width: dimension(width),
            height: dimension(height),
        })
    }
}

fn dimension(value: &str) -> Option<u32> {
    if value.is_empty() {
        None
    } else {
        value.parse().ok()
    }
}

/// Rewrites every `![alt](url =WxH)` into `![alt](url<sentinel>WxH)`.
/// Text that doesn't match the annotation exactly is returned untouched.
pub fn preprocess(source: &str) -> String {
    SIZE_ANNOTATION
        .replace_all(source, format!("${{1}}{SIZE_SENTINEL}${{2}})"))
        .into_owned()
}

/// Undoes [`preprocess`] in text that didn't end up as an image destination,
/// such as inline code or a fenced block quoting the annotation.
pub fn restore(text: &str) -> Cow<'_, str> {
    if !text.contains(SIZE_SENTINEL) {
        return Cow::Borrowed(text);
    }
    FOLDED_SIZE.replace_all(text, " =${1}")
}

/// Splits a parsed image URL into its real source and the smuggled size, if any.
pub fn split_sized_url(url: &str) -> Option<(&str, ImageSize)> {
    let captures = SIZE_SUFFIX.captures(url)?;
    let whole = captures.get(0)?;
    let size = ImageSize::parse(captures.get(1)?.as_str())?;
    Some((&url[..whole.start()], size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_size_into_url() {
        assert_eq!(
            preprocess("![alt](http://x/y.png =100x50)"),
            "![alt](http://x/y.png_33B2BF251EFD_100x50)"
        );
    }

    #[test]
    fn rewrites_every_annotation_in_text() {
        let source = "a ![](a.png =10x) b ![b](b.png =x20) c";
        assert_eq!(
            preprocess(source),
            "a ![](a.png_33B2BF251EFD_10x) b ![b](b.png_33B2BF251EFD_x20) c"
        );
    }

    #[test]
    fn leaves_malformed_annotations_alone() {
        for source in [
            "![alt](http://x/y.png)",
            "![alt](http://x/y.png =x)",
            "![alt](http://x/y.png =100)",
            "![alt](http://x/y.png =100x50 )",
            "![alt](http://x/y.png =wide)",
            "[link](http://x/ =100x50)",
        ] {
            assert_eq!(preprocess(source), source);
        }
    }

    #[test]
    fn restore_reverses_preprocess() {
        let source = "see ![a](b.png =10x20) and ![c](d.png =x5)";
        assert_eq!(restore(&preprocess(source)), source);
        assert!(matches!(restore("no sizes here"), Cow::Borrowed(_)));
    }

    #[test]
    fn splits_width_and_height() {
        let (src, size) = split_sized_url("http://x/y.png_33B2BF251EFD_100x50").unwrap();
        assert_eq!(src, "http://x/y.png");
        assert_eq!(
            size,
            ImageSize {
                width: Some(100),
                height: Some(50)
            }
        );
    }

    #[test]
    fn splits_single_dimension() {
        let (_, size) = split_sized_url("y.png_33B2BF251EFD_100x").unwrap();
        assert_eq!(size.width, Some(100));
        assert_eq!(size.height, None);

        let (_, size) = split_sized_url("y.png_33B2BF251EFD_x40").unwrap();
        assert_eq!(size.width, None);
        assert_eq!(size.height, Some(40));
    }

    #[test]
    fn plain_url_has_no_size() {
        assert!(split_sized_url("http://x/y.png").is_none());
        assert!(split_sized_url("http://x/y.png_33B2BF251EFD_").is_none());
    }
}
