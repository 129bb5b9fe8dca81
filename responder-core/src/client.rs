use crate::{Asset, BlobRef, CandidatePost, CoreError, LinkMetadata, PostRef, ReplyDraft, Session, ThreadNode};
use async_trait::async_trait;

/// Capabilities the decision engine needs from the social network.
///
/// Implementations validate wire payloads into the typed values above; the
/// engine never sees raw JSON.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Fails with `SocialApiError::AuthenticationFailed` on bad credentials.
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Session, CoreError>;

    async fn search_posts(&self, query: &str, limit: u32)
        -> Result<Vec<CandidatePost>, CoreError>;

    async fn get_reply_thread(&self, post_uri: &str, depth: u32) -> Result<ThreadNode, CoreError>;

    async fn submit_post(&self, draft: &ReplyDraft) -> Result<PostRef, CoreError>;

    async fn upload_asset(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef, CoreError>;

    async fn fetch_url_metadata(&self, url: &str) -> Result<LinkMetadata, CoreError>;

    /// Downloads a remote file, used for link-card thumbnails.
    async fn fetch_remote_asset(&self, url: &str) -> Result<Asset, CoreError>;
}
