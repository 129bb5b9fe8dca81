use async_trait::async_trait;
use responder_core::{
    has_replied_remote, Asset, BlobRef, CandidatePost, CoreError, LinkMetadata, PostRef,
    ReplyDraft, Session, SocialApiError, SocialClient, ThreadNode,
};

struct ThreadOnlyClient {
    thread: Option<ThreadNode>,
}

fn node(handle: &str, replies: Vec<ThreadNode>) -> ThreadNode {
    ThreadNode {
        uri: format!("at://{handle}/app.bsky.feed.post/x"),
        author_handle: handle.to_string(),
        text: String::new(),
        replies,
    }
}

fn unsupported() -> CoreError {
    CoreError::Internal {
        message: "not used in this test".to_string(),
    }
}

#[async_trait]
impl SocialClient for ThreadOnlyClient {
    async fn authenticate(&self, _identifier: &str, _secret: &str) -> Result<Session, CoreError> {
        Err(unsupported())
    }

    async fn search_posts(&self, _query: &str, _limit: u32) -> Result<Vec<CandidatePost>, CoreError> {
        Err(unsupported())
    }

    async fn get_reply_thread(&self, post_uri: &str, depth: u32) -> Result<ThreadNode, CoreError> {
        assert_eq!(depth, 2);
        self.thread.clone().ok_or_else(|| {
            CoreError::SocialApi(SocialApiError::ThreadFetchFailed {
                uri: post_uri.to_string(),
                reason: "upstream 502".to_string(),
            })
        })
    }

    async fn submit_post(&self, _draft: &ReplyDraft) -> Result<PostRef, CoreError> {
        Err(unsupported())
    }

    async fn upload_asset(&self, _bytes: Vec<u8>, _mime_type: &str) -> Result<BlobRef, CoreError> {
        Err(unsupported())
    }

    async fn fetch_url_metadata(&self, _url: &str) -> Result<LinkMetadata, CoreError> {
        Err(unsupported())
    }

    async fn fetch_remote_asset(&self, _url: &str) -> Result<Asset, CoreError> {
        Err(unsupported())
    }
}

#[tokio::test]
async fn direct_reply_from_us_is_found() {
    let client = ThreadOnlyClient {
        thread: Some(node("alice.bsky.social", vec![node("bot.bsky.social", vec![])])),
    };
    assert!(has_replied_remote(&client, "at://post", "bot.bsky.social").await);
}

#[tokio::test]
async fn nested_reply_from_us_is_found() {
    let client = ThreadOnlyClient {
        thread: Some(node(
            "alice.bsky.social",
            vec![node("carol.bsky.social", vec![node("Bot.bsky.social", vec![])])],
        )),
    };
    assert!(has_replied_remote(&client, "at://post", "bot.bsky.social").await);
}

#[tokio::test]
async fn thread_without_our_reply() {
    let client = ThreadOnlyClient {
        thread: Some(node(
            "bot.bsky.social",
            vec![node("carol.bsky.social", vec![])],
        )),
    };
    // The root being ours does not count as a reply.
    assert!(!has_replied_remote(&client, "at://post", "bot.bsky.social").await);
}

#[tokio::test]
async fn fetch_failure_fails_closed() {
    let client = ThreadOnlyClient { thread: None };
    assert!(has_replied_remote(&client, "at://post", "bot.bsky.social").await);
}
