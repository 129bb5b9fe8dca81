use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum reply length accepted by the posting platform, in characters.
pub const MAX_POST_CHARS: usize = 300;

/// Fallback link-card title used when a page cannot be scraped.
pub const FALLBACK_LINK_TITLE: &str = "The Bluesky Show";
/// Fallback link-card description used when a page cannot be scraped.
pub const FALLBACK_LINK_DESCRIPTION: &str =
    "Join us for live discussions every Friday at 3:30 PM Central!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    #[default]
    Random,
    FixedFirst,
    TimeBased,
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "fixed-first" | "fixed" | "first" => Ok(Self::FixedFirst),
            "time-based" | "time" | "time-sensitive" => Ok(Self::TimeBased),
            other => Err(format!("unknown selection mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseVariant {
    pub text: String,
    #[serde(default, rename = "image")]
    pub image_ref: Option<String>,
    #[serde(default, rename = "alt")]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
}

impl ResponseVariant {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_ref: None,
            alt_text: None,
            link_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagRule {
    pub hashtag: String,
    #[serde(default, rename = "responses")]
    pub response_variants: Vec<ResponseVariant>,
    #[serde(default, rename = "time_sensitive")]
    pub time_sensitive_variants: Option<Vec<ResponseVariant>>,
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    /// Pages turned into link-card embeds, one picked per reply.
    #[serde(default)]
    pub link_cards: Vec<String>,
    /// Site appended as a trailing line when no embed carries a link.
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub include_link: bool,
    /// Historically observed mixed-case spellings searched in addition to
    /// the generated case variants.
    #[serde(default)]
    pub extra_variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    pub uri: String,
    pub cid: String,
    pub text: String,
    pub indexed_at: DateTime<Utc>,
    /// Root of the thread when the post is itself a reply.
    pub thread_root: Option<PostRef>,
    pub author_handle: String,
}

impl CandidatePost {
    pub fn post_ref(&self) -> PostRef {
        PostRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        }
    }

    /// Threading target for a reply: under the original's root when it is a
    /// reply, directly under the original otherwise.
    pub fn reply_target(&self) -> ReplyTarget {
        let parent = self.post_ref();
        let root = self.thread_root.clone().unwrap_or_else(|| parent.clone());
        ReplyTarget { root, parent }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub post_uri: String,
    pub hashtag: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub uri: String,
    pub author_handle: String,
    pub text: String,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Depth-first search over every nested reply (the node itself excluded).
    pub fn has_reply_from(&self, handle: &str) -> bool {
        self.replies.iter().any(|reply| {
            reply.author_handle.eq_ignore_ascii_case(handle) || reply.has_reply_from(handle)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub root: PostRef,
    pub parent: PostRef,
}

/// Opaque blob reference returned by an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq)]
pub struct ImageEmbed {
    pub blob: BlobRef,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEmbed {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumb: Option<BlobRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Embed {
    Images(Vec<ImageEmbed>),
    External(ExternalEmbed),
}

impl Embed {
    pub fn carries_link(&self) -> bool {
        matches!(self, Embed::External(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyDraft {
    pub text: String,
    pub reply: Option<ReplyTarget>,
    pub embed: Option<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMetadata {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

impl LinkMetadata {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_LINK_TITLE.to_string(),
            description: FALLBACK_LINK_DESCRIPTION.to_string(),
            image_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Outcome counters for one pass over the configured hashtags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub searched: usize,
    pub candidates: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}
