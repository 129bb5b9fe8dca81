//! Open Graph scraping for external link cards.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use responder_core::{LinkMetadata, FALLBACK_LINK_DESCRIPTION, FALLBACK_LINK_TITLE};

pub const MAX_TITLE_CHARS: usize = 300;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

struct Patterns {
    title: Regex,
    og_title: Regex,
    og_description: Regex,
    meta_description: Regex,
    og_image: Regex,
    entity: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let build = |pattern: &str| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
            };
            Some(Patterns {
                title: build(r"<title[^>]*>([^<]+)</title>")?,
                og_title: build(r#"<meta\s+property=["']og:title["']\s+content=["']([^"']+)["']"#)?,
                og_description: build(
                    r#"<meta\s+property=["']og:description["']\s+content=["']([^"']+)["']"#,
                )?,
                meta_description: build(
                    r#"<meta\s+name=["']description["']\s+content=["']([^"']+)["']"#,
                )?,
                og_image: build(
                    r#"<meta\s+property=["']og:image["']\s+content=["']([^"']+)["']"#,
                )?,
                entity: build(r"&[a-zA-Z0-9#]+;")?,
            })
        })
        .as_ref()
}

fn first_capture(html: &str, candidates: &[&Regex]) -> Option<String> {
    candidates.iter().find_map(|re| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Extracts title, description and thumbnail URL from a page.
///
/// Missing fields fall back to the show's default card text.
pub fn parse_link_metadata(html: &str) -> LinkMetadata {
    let Some(p) = patterns() else {
        return LinkMetadata::fallback();
    };

    let title = first_capture(html, &[&p.title, &p.og_title])
        .map(|t| decode_html_entities(&t))
        .unwrap_or_else(|| FALLBACK_LINK_TITLE.to_string());
    let description = first_capture(html, &[&p.og_description, &p.meta_description])
        .map(|d| decode_html_entities(&d))
        .unwrap_or_else(|| FALLBACK_LINK_DESCRIPTION.to_string());
    let image_url = first_capture(html, &[&p.og_image]);

    LinkMetadata {
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        image_url,
    }
}

/// Decodes the handful of entities commonly found in titles. Unknown
/// entities are left as they are.
pub fn decode_html_entities(text: &str) -> String {
    let Some(p) = patterns() else {
        return text.to_string();
    };
    p.entity
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[0];
            match entity {
                "&amp;" => "&",
                "&lt;" => "<",
                "&gt;" => ">",
                "&quot;" => "\"",
                "&#39;" | "&apos;" | "&#x27;" => "'",
                "&#x2F;" => "/",
                "&#x60;" => "`",
                "&#x3D;" => "=",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
