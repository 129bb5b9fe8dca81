use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Rich-text annotation marking a byte range of the post text as a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
}

fn url_pattern() -> Option<&'static Regex> {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://[^\s]+").ok()).as_ref()
}

/// Finds http(s) URLs in `text`. Offsets are UTF-8 byte offsets, and
/// trailing sentence punctuation is not part of the link.
pub fn detect_link_facets(text: &str) -> Vec<Facet> {
    let Some(pattern) = url_pattern() else {
        return Vec::new();
    };
    pattern
        .find_iter(text)
        .filter_map(|m| {
            let uri = m
                .as_str()
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));
            if url::Url::parse(uri).is_err() {
                return None;
            }
            Some(Facet {
                index: ByteSlice {
                    byte_start: m.start(),
                    byte_end: m.start() + uri.len(),
                },
                features: vec![FacetFeature::Link {
                    uri: uri.to_string(),
                }],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_bytes() {
        let text = "Live 🎙️ now\n\nhttps://blueskyshow.com";
        let facets = detect_link_facets(text);
        assert_eq!(facets.len(), 1);

        let facet = &facets[0];
        assert_eq!(&text[facet.index.byte_start..facet.index.byte_end], "https://blueskyshow.com");
        assert_eq!(facet.index.byte_end, text.len());
    }

    #[test]
    fn test_trailing_punctuation_excluded() {
        let facets = detect_link_facets("see https://example.com/show. Thanks!");
        assert_eq!(
            facets[0].features[0],
            FacetFeature::Link {
                uri: "https://example.com/show".to_string()
            }
        );
    }

    #[test]
    fn test_no_links() {
        assert!(detect_link_facets("#theblueskyshow is on Friday").is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let facets = detect_link_facets("https://a.io");
        let json = serde_json::to_value(&facets).unwrap();
        assert_eq!(json[0]["index"]["byteStart"], 0);
        assert_eq!(json[0]["index"]["byteEnd"], 12);
        assert_eq!(json[0]["features"][0]["$type"], "app.bsky.richtext.facet#link");
    }
}
