use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left alone when encoding a URL component: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Turns a post title (or heading text) into the path segment used for its permalink.
///
/// Spaces become hyphens one for one, only the first `.` is dropped, the result is
/// lowercased and then percent-encoded. Runs of spaces are not collapsed.
pub fn generate_url_seo(title: &str) -> String {
    let hyphenated = title.split(' ').collect::<Vec<_>>().join("-");
    let lowered = hyphenated.replacen('.', "", 1).to_lowercase();
    utf8_percent_encode(&lowered, URL_COMPONENT).to_string()
}

/// Compares a generated slug with a path segment the router has already decoded.
pub fn slug_matches(slug: &str, requested: &str) -> bool {
    slug == requested || percent_decode_str(slug).decode_utf8_lossy() == requested
}
