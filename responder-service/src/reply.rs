//! Turns a selected response variant into a postable reply.

use responder_core::{
    append_website_link, BlobRef, CandidatePost, CoreError, Embed, ErrorRecovery, ExternalEmbed,
    HashtagRule, ImageEmbed, LinkMetadata, RecoveryResult, ReplyDraft, ResponseVariant,
    SocialClient,
};
use tracing::{debug, info, warn};

use crate::assets::AssetSource;

pub struct ReplyComposer<'a> {
    client: &'a dyn SocialClient,
    assets: &'a dyn AssetSource,
}

impl<'a> ReplyComposer<'a> {
    pub fn new(client: &'a dyn SocialClient, assets: &'a dyn AssetSource) -> Self {
        Self { client, assets }
    }

    /// Builds the reply for `post`. Attachment failures only drop the
    /// attachment; fatal errors are returned.
    pub async fn compose(
        &self,
        post: &CandidatePost,
        rule: Option<&HashtagRule>,
        variant: &ResponseVariant,
        rng: &mut fastrand::Rng,
    ) -> Result<ReplyDraft, CoreError> {
        let mut embed = match &variant.image_ref {
            Some(image_ref) => self.image_embed(image_ref, variant).await?,
            None => None,
        };

        if embed.is_none() {
            if let Some(url) = link_card_url(rule, variant, rng) {
                embed = Some(self.link_card(&url).await?);
            }
        }

        let carries_link = embed.as_ref().is_some_and(Embed::carries_link);
        let text = append_website_link(rule, &variant.text, carries_link);

        Ok(ReplyDraft {
            text,
            reply: Some(post.reply_target()),
            embed,
        })
    }

    async fn image_embed(
        &self,
        image_ref: &str,
        variant: &ResponseVariant,
    ) -> Result<Option<Embed>, CoreError> {
        let uploaded = self.upload_local(image_ref).await;
        match ErrorRecovery::recover(uploaded.map(Some), || None) {
            RecoveryResult::Recovered(Some(blob)) => {
                info!("Attached image {}", image_ref);
                Ok(Some(Embed::Images(vec![ImageEmbed {
                    blob,
                    alt: variant.alt_text.clone().unwrap_or_default(),
                }])))
            }
            RecoveryResult::Failed(e) => Err(e),
            _ => {
                warn!("Replying without image {}", image_ref);
                Ok(None)
            }
        }
    }

    async fn upload_local(&self, image_ref: &str) -> Result<BlobRef, CoreError> {
        let asset = self.assets.load(image_ref).await?;
        self.client.upload_asset(asset.bytes, &asset.mime_type).await
    }

    async fn upload_remote(&self, url: &str) -> Result<BlobRef, CoreError> {
        let asset = self.client.fetch_remote_asset(url).await?;
        self.client.upload_asset(asset.bytes, &asset.mime_type).await
    }

    async fn link_card(&self, url: &str) -> Result<Embed, CoreError> {
        let fetched = self.client.fetch_url_metadata(url).await;
        let metadata = match ErrorRecovery::recover(fetched, LinkMetadata::fallback) {
            RecoveryResult::Recovered(metadata) | RecoveryResult::Degraded(metadata) => metadata,
            RecoveryResult::Failed(e) => return Err(e),
            RecoveryResult::Skipped => LinkMetadata::fallback(),
        };

        let thumb = match &metadata.image_url {
            Some(image_url) => {
                let uploaded = self.upload_remote(image_url).await;
                match ErrorRecovery::recover(uploaded.map(Some), || None) {
                    RecoveryResult::Recovered(blob) => blob,
                    RecoveryResult::Failed(e) => return Err(e),
                    _ => {
                        warn!("Link card for {} goes out without a thumbnail", url);
                        None
                    }
                }
            }
            None => None,
        };

        debug!("Link card for {}: {}", url, metadata.title);
        Ok(Embed::External(ExternalEmbed {
            uri: url.to_string(),
            title: metadata.title,
            description: metadata.description,
            thumb,
        }))
    }
}

/// The variant's own link wins; otherwise one of the rule's cards at random.
fn link_card_url(
    rule: Option<&HashtagRule>,
    variant: &ResponseVariant,
    rng: &mut fastrand::Rng,
) -> Option<String> {
    if let Some(url) = &variant.link_url {
        return Some(url.clone());
    }
    let cards = &rule?.link_cards;
    if cards.is_empty() {
        return None;
    }
    cards.get(rng.usize(..cards.len())).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use responder_core::SelectionMode;

    fn rule(cards: &[&str]) -> HashtagRule {
        HashtagRule {
            hashtag: "#theblueskyshow".to_string(),
            response_variants: vec![ResponseVariant::text("hi")],
            time_sensitive_variants: None,
            cooldown_minutes: None,
            selection_mode: SelectionMode::Random,
            link_cards: cards.iter().map(|c| c.to_string()).collect(),
            website_url: None,
            include_link: false,
            extra_variants: Vec::new(),
        }
    }

    #[test]
    fn test_variant_link_wins() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut variant = ResponseVariant::text("hi");
        variant.link_url = Some("https://variant.example".to_string());

        let url = link_card_url(Some(&rule(&["https://rule.example"])), &variant, &mut rng);
        assert_eq!(url.as_deref(), Some("https://variant.example"));
    }

    #[test]
    fn test_rule_cards_are_sampled() {
        let mut rng = fastrand::Rng::with_seed(7);
        let variant = ResponseVariant::text("hi");
        let cards = ["https://a.example", "https://b.example"];

        for _ in 0..20 {
            let url = link_card_url(Some(&rule(&cards)), &variant, &mut rng).unwrap();
            assert!(cards.contains(&url.as_str()));
        }
    }

    #[test]
    fn test_no_link_without_cards() {
        let mut rng = fastrand::Rng::with_seed(7);
        let variant = ResponseVariant::text("hi");
        assert!(link_card_url(Some(&rule(&[])), &variant, &mut rng).is_none());
        assert!(link_card_url(None, &variant, &mut rng).is_none());
    }
}
