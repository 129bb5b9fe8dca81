//! XRPC wire types and their conversion into the engine's value types.
//!
//! Records arrive as open JSON; they are validated here and anything that
//! does not look like a post is dropped rather than passed on.

use chrono::{DateTime, Utc};
use responder_core::{CandidatePost, Embed, PostRef, ReplyDraft, ThreadNode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::facets::{detect_link_facets, Facet};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl XrpcErrorBody {
    pub fn describe(&self, status: u16) -> String {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => format!("{error}: {message}"),
            (Some(error), None) => error.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => format!("HTTP {status}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileViewBasic {
    #[serde(default)]
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileViewBasic,
    #[serde(default)]
    pub record: Value,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRefIn {
    pub root: StrongRef,
    #[allow(dead_code)]
    pub parent: StrongRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRecordIn {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply: Option<ReplyRefIn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPostsResponse {
    /// Kept raw so one malformed view cannot sink the whole page.
    #[serde(default)]
    pub posts: Vec<Value>,
}

impl SearchPostsResponse {
    pub fn into_candidates(self) -> Vec<CandidatePost> {
        self.posts
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<PostView>(raw) {
                Ok(view) => view.into_candidate(),
                Err(e) => {
                    warn!("Ignoring malformed post view in search results: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPostThreadResponse {
    pub thread: ThreadUnion,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum ThreadUnion {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(Box<ThreadViewPost>),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound,
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default)]
    pub replies: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordResponse {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadBlobResponse {
    pub blob: Value,
}

impl PostView {
    fn record(&self) -> Option<PostRecordIn> {
        match serde_json::from_value::<PostRecordIn>(self.record.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Ignoring post {} with malformed record: {}", self.uri, e);
                None
            }
        }
    }

    pub fn into_candidate(self) -> Option<CandidatePost> {
        let record = self.record()?;
        Some(CandidatePost {
            thread_root: record.reply.map(|reply| PostRef {
                uri: reply.root.uri,
                cid: reply.root.cid,
            }),
            text: record.text,
            uri: self.uri,
            cid: self.cid,
            indexed_at: self.indexed_at,
            author_handle: self.author.handle,
        })
    }
}

impl ThreadViewPost {
    pub fn into_node(self) -> ThreadNode {
        let text = self.post.record().map(|record| record.text).unwrap_or_default();
        ThreadNode {
            uri: self.post.uri,
            author_handle: self.post.author.handle,
            text,
            replies: self
                .replies
                .into_iter()
                .filter_map(|raw| match serde_json::from_value::<ThreadUnion>(raw) {
                    Ok(ThreadUnion::Post(view)) => Some(view.into_node()),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Ignoring malformed reply in thread: {}", e);
                        None
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecordOut {
    #[serde(rename = "$type")]
    pub record_type: &'static str,
    pub text: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
}

impl PostRecordOut {
    pub fn from_draft(draft: &ReplyDraft, now: DateTime<Utc>) -> Self {
        Self {
            record_type: POST_COLLECTION,
            text: draft.text.clone(),
            created_at: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            reply: draft.reply.as_ref().map(|target| {
                json!({
                    "root": { "uri": target.root.uri, "cid": target.root.cid },
                    "parent": { "uri": target.parent.uri, "cid": target.parent.cid },
                })
            }),
            embed: draft.embed.as_ref().map(embed_json),
            facets: detect_link_facets(&draft.text),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'static str,
    pub record: PostRecordOut,
}

fn embed_json(embed: &Embed) -> Value {
    match embed {
        Embed::Images(images) => json!({
            "$type": "app.bsky.embed.images",
            "images": images
                .iter()
                .map(|image| json!({ "image": image.blob.0, "alt": image.alt }))
                .collect::<Vec<_>>(),
        }),
        Embed::External(card) => {
            let mut external = json!({
                "uri": card.uri,
                "title": card.title,
                "description": card.description,
            });
            if let Some(thumb) = &card.thumb {
                external["thumb"] = thumb.0.clone();
            }
            json!({
                "$type": "app.bsky.embed.external",
                "external": external,
            })
        }
    }
}
