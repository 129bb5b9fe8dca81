//! AT Protocol client speaking XRPC over HTTPS.
//!
//! Implements [`SocialClient`] against a Bluesky PDS using an app-password
//! session. Every request is a single attempt; callers decide what a
//! failure means.

pub mod api;
pub mod facets;
pub mod link_card;


use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use responder_core::{
    Asset, BlobRef, CandidatePost, CoreError, ErrorExt, LinkMetadata, PostRef, ReplyDraft,
    Session, SocialApiError, SocialClient, ThreadNode,
};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::api::{
    CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, CreateSessionResponse,
    GetPostThreadResponse, PostRecordOut, SearchPostsResponse, ThreadUnion, UploadBlobResponse,
    XrpcErrorBody, POST_COLLECTION,
};
use crate::link_card::parse_link_metadata;

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; BlueSkyBot/1.0)";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const DEFAULT_ASSET_MIME: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct BlueskyConfig {
    pub service_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl BlueskyConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into().trim_end_matches('/').to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_URL)
    }
}

#[derive(Clone)]
struct AuthSession {
    did: String,
    handle: String,
    access_jwt: String,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct BlueskyClient {
    config: BlueskyConfig,
    http_client: Client,
    session: RwLock<Option<AuthSession>>,
}

impl BlueskyClient {
    pub fn new(config: BlueskyConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
            session: RwLock::new(None),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.config.service_url
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn xrpc_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.config.service_url, nsid)
    }

    async fn authorized(&self, method: Method, nsid: &str) -> Result<(RequestBuilder, AuthSession), CoreError> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(CoreError::SocialApi(SocialApiError::NotAuthenticated))?;
        let builder = self
            .http_client
            .request(method, self.xrpc_url(nsid))
            .bearer_auth(&session.access_jwt);
        Ok((builder, session))
    }

    /// Sends one request and maps non-success statuses onto the error
    /// taxonomy.
    async fn make_request(&self, request_builder: RequestBuilder, endpoint: &str) -> Result<Response, CoreError> {
        info!("Making request: {}", endpoint);

        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {}: {}", endpoint, e);
            CoreError::Network(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("Rate limited, retry after {} seconds", retry_after);
            return Err(CoreError::SocialApi(SocialApiError::RateLimitExceeded {
                retry_after,
            }));
        }

        if status.is_server_error() {
            return Err(CoreError::SocialApi(SocialApiError::ServerError {
                status_code: status.as_u16(),
            }));
        }

        let body = response
            .json::<XrpcErrorBody>()
            .await
            .map(|body| body.describe(status.as_u16()))
            .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));

        if status.as_u16() == 401 {
            return Err(CoreError::SocialApi(SocialApiError::InvalidToken));
        }

        Err(CoreError::RequestFailed {
            message: format!("{endpoint}: {body}"),
            status_code: Some(status.as_u16()),
        })
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, CoreError> {
        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse {} response: {}", endpoint, e);
            CoreError::SocialApi(SocialApiError::InvalidResponse {
                details: format!("Failed to parse {endpoint} response"),
            })
        })
    }
}

/// Keeps fatal and rate-limit errors as they are and files everything else
/// under the operation that failed. Only used for XRPC calls; a 401 from a
/// scraped website says nothing about our session.
fn scoped(err: CoreError, wrap: impl FnOnce(String) -> SocialApiError) -> CoreError {
    match err {
        CoreError::SocialApi(SocialApiError::RateLimitExceeded { .. }) => err,
        err if err.is_fatal() => err,
        err => CoreError::SocialApi(wrap(err.to_string())),
    }
}

#[async_trait]
impl SocialClient for BlueskyClient {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Session, CoreError> {
        const NSID: &str = "com.atproto.server.createSession";
        let request = self
            .http_client
            .post(self.xrpc_url(NSID))
            .json(&CreateSessionRequest {
                identifier,
                password: secret,
            });

        let response = self.make_request(request, NSID).await.map_err(|e| {
            CoreError::SocialApi(SocialApiError::AuthenticationFailed {
                reason: match e {
                    CoreError::RequestFailed { message, .. } => message,
                    CoreError::SocialApi(SocialApiError::InvalidToken) => {
                        "Invalid identifier or password".to_string()
                    }
                    other => other.to_string(),
                },
            })
        })?;
        let created: CreateSessionResponse = Self::parse_json(response, NSID).await?;

        info!("Authenticated as {} ({})", created.handle, created.did);
        let session = Session {
            did: created.did.clone(),
            handle: created.handle.clone(),
        };
        *self.session.write().await = Some(AuthSession {
            did: created.did,
            handle: created.handle,
            access_jwt: created.access_jwt,
        });
        Ok(session)
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<CandidatePost>, CoreError> {
        const NSID: &str = "app.bsky.feed.searchPosts";
        let wrap = |reason| SocialApiError::SearchFailed {
            query: query.to_string(),
            reason,
        };

        let (request, _) = self.authorized(Method::GET, NSID).await?;
        let limit = limit.to_string();
        let request = request.query(&[("q", query), ("limit", limit.as_str())]);

        let response = self
            .make_request(request, NSID)
            .await
            .map_err(|e| scoped(e, wrap))?;
        let results: SearchPostsResponse = Self::parse_json(response, NSID).await?;

        let posts = results.into_candidates();
        info!("Search for {} returned {} posts", query, posts.len());
        Ok(posts)
    }

    async fn get_reply_thread(&self, post_uri: &str, depth: u32) -> Result<ThreadNode, CoreError> {
        const NSID: &str = "app.bsky.feed.getPostThread";
        let wrap = |reason| SocialApiError::ThreadFetchFailed {
            uri: post_uri.to_string(),
            reason,
        };

        let (request, _) = self.authorized(Method::GET, NSID).await?;
        let depth = depth.to_string();
        let request = request.query(&[("uri", post_uri), ("depth", depth.as_str())]);

        let response = self
            .make_request(request, NSID)
            .await
            .map_err(|e| scoped(e, wrap))?;
        let thread: GetPostThreadResponse = Self::parse_json(response, NSID).await?;

        match thread.thread {
            ThreadUnion::Post(view) => Ok(view.into_node()),
            other => Err(CoreError::SocialApi(wrap(format!(
                "thread root is not a post: {other:?}"
            )))),
        }
    }

    async fn submit_post(&self, draft: &ReplyDraft) -> Result<PostRef, CoreError> {
        const NSID: &str = "com.atproto.repo.createRecord";
        let wrap = |reason| SocialApiError::PostFailed { reason };

        let (request, session) = self.authorized(Method::POST, NSID).await?;
        let request = request.json(&CreateRecordRequest {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: PostRecordOut::from_draft(draft, Utc::now()),
        });

        let response = self
            .make_request(request, NSID)
            .await
            .map_err(|e| scoped(e, wrap))?;
        let created: CreateRecordResponse = Self::parse_json(response, NSID).await?;

        info!("Posted {}", created.uri);
        Ok(PostRef {
            uri: created.uri,
            cid: created.cid,
        })
    }

    async fn upload_asset(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef, CoreError> {
        const NSID: &str = "com.atproto.repo.uploadBlob";
        let wrap = |reason| SocialApiError::UploadFailed { reason };

        let size = bytes.len();
        let (request, _) = self.authorized(Method::POST, NSID).await?;
        let request = request.header(header::CONTENT_TYPE, mime_type).body(bytes);

        let response = self
            .make_request(request, NSID)
            .await
            .map_err(|e| scoped(e, wrap))?;
        let uploaded: UploadBlobResponse = Self::parse_json(response, NSID).await?;

        debug!("Uploaded {} bytes as {}", size, mime_type);
        Ok(BlobRef(uploaded.blob))
    }

    async fn fetch_url_metadata(&self, url: &str) -> Result<LinkMetadata, CoreError> {
        let wrap = |reason| SocialApiError::MetadataFailed {
            url: url.to_string(),
            reason,
        };

        let request = self.http_client.get(url);
        let response = self
            .make_request(request, url)
            .await
            .map_err(|e| CoreError::SocialApi(wrap(e.to_string())))?;
        let html = response
            .text()
            .await
            .map_err(|e| CoreError::SocialApi(wrap(e.to_string())))?;

        let metadata = parse_link_metadata(&html);
        debug!("Link card for {}: {:?}", url, metadata.title);
        Ok(metadata)
    }

    async fn fetch_remote_asset(&self, url: &str) -> Result<Asset, CoreError> {
        let wrap = |reason| SocialApiError::UploadFailed { reason };

        let request = self.http_client.get(url);
        let response = self
            .make_request(request, url)
            .await
            .map_err(|e| CoreError::SocialApi(wrap(e.to_string())))?;
        let mime_type = match response.headers().get(header::CONTENT_TYPE) {
            None => DEFAULT_ASSET_MIME.to_string(),
            Some(value) => {
                let essence = value
                    .to_str()
                    .ok()
                    .and_then(|value| value.split(';').next())
                    .map(|value| value.trim().to_ascii_lowercase())
                    .unwrap_or_default();
                if !essence.starts_with("image/") {
                    warn!("{} is not an image ({:?})", url, value);
                    return Err(CoreError::SocialApi(wrap(format!(
                        "unexpected content type {essence:?}"
                    ))));
                }
                essence
            }
        };
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::SocialApi(wrap(e.to_string())))?;

        Ok(Asset {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}
