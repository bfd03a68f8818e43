//! Text parsing and extraction utilities for tweet content.
//!
//! This module contains functions for parsing tweet text to extract hashtags
//! and links, and for pulling preview metadata out of a linked HTML page.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::models::LinkPreview;

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+").expect("hashtag pattern is valid"));

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("link pattern is valid"));

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("meta tag pattern is valid"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid"));

/// Extracts every hashtag from tweet text, in order of appearance.
///
/// A hashtag is a `#` followed by one or more word characters. Repeated
/// hashtags are returned once per occurrence, and neither case nor length is
/// normalized. The leading `#` is kept.
///
/// # Examples
///
/// ```
/// use tweet_service::tweets::extract_hashtags;
///
/// assert_eq!(
///     extract_hashtags("hello #world #world"),
///     vec!["#world".to_string(), "#world".to_string()]
/// );
/// assert!(extract_hashtags("no tags here").is_empty());
/// ```
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Finds the first `http://` or `https://` link in tweet text.
///
/// Trailing punctuation that commonly ends a sentence is stripped before the
/// candidate is parsed. Candidates that do not parse as a URL with a host are
/// skipped.
pub fn extract_first_link(text: &str) -> Option<Url> {
    for candidate in LINK.find_iter(text) {
        let trimmed = candidate
            .as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ')' | ';' | ':'));
        if let Ok(url) = Url::parse(trimmed) {
            if url.host_str().is_some() {
                return Some(url);
            }
        }
    }

    None
}

/// Reads the `content` of the first `<meta>` tag whose `property` or `name`
/// equals `key`, ignoring case.
fn meta_content(html: &str, key: &str) -> Option<String> {
    for tag in META_TAG.find_iter(html) {
        let mut matches_key = false;
        let mut content = None;

        for attribute in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = attribute[1].to_ascii_lowercase();
            let value = attribute
                .get(2)
                .or_else(|| attribute.get(3))
                .map(|v| v.as_str().trim())
                .unwrap_or_default();
            match name.as_str() {
                "property" | "name" if value.eq_ignore_ascii_case(key) => matches_key = true,
                "content" => content = Some(value),
                _ => {}
            }
        }

        if matches_key {
            if let Some(value) = content.filter(|v| !v.is_empty()) {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn html_title(html: &str) -> Option<String> {
    let title = TITLE.captures(html)?.get(1)?.as_str().trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Builds a link preview from a fetched HTML page.
///
/// - title: `og:title`, falling back to `<title>`
/// - description: `og:description`, falling back to `<meta name="description">`
/// - cover: `og:image`, resolved against the page URL when relative
pub fn parse_link_preview(url: &Url, html: &str) -> LinkPreview {
    let title = meta_content(html, "og:title").or_else(|| html_title(html));
    let description =
        meta_content(html, "og:description").or_else(|| meta_content(html, "description"));
    let cover = meta_content(html, "og:image")
        .and_then(|image| url.join(&image).ok())
        .map(|image| image.to_string());

    LinkPreview {
        url: url.to_string(),
        title,
        description,
        cover,
    }
}
