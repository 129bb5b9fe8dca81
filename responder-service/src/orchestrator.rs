//! One pass over the configured hashtags: search, filter, guard, reply.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use responder_core::{
    has_replied_remote, wall_clock, AppConfig, CandidatePost, Clock, CoreError, ErrorExt,
    ErrorRecovery, HashtagMatcher, RecoveryResult, RecoveryStrategy, ReplyHistory, ReplyRecord,
    ResponseCatalog, RunReport, SearchStrategy, SocialClient, SystemClock,
};
use tracing::{debug, info, warn};

use crate::assets::AssetSource;
use crate::reply::ReplyComposer;

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Written by the account we reply as.
    OwnPost,
    NoExactMatch,
    AlreadyReplied,
    RepliedInThread,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Replied(ReplyRecord),
    Skipped(SkipReason),
}

pub struct ReplyOrchestrator {
    config: AppConfig,
    client: Arc<dyn SocialClient>,
    catalog: ResponseCatalog,
    matcher: HashtagMatcher,
    assets: Arc<dyn AssetSource>,
    clock: Arc<dyn Clock>,
    history: ReplyHistory,
    new_records: Vec<ReplyRecord>,
    rng: fastrand::Rng,
}

impl ReplyOrchestrator {
    pub fn new(
        config: AppConfig,
        client: Arc<dyn SocialClient>,
        catalog: ResponseCatalog,
        matcher: HashtagMatcher,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            config,
            client,
            catalog,
            matcher,
            assets,
            clock: Arc::new(SystemClock),
            history: ReplyHistory::new(),
            new_records: Vec::new(),
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_history(mut self, history: ReplyHistory) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn history(&self) -> &ReplyHistory {
        &self.history
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Adds records loaded from elsewhere, skipping ones already known.
    pub fn merge_history(&mut self, records: Vec<ReplyRecord>) {
        let mut merged = self.history.records().to_vec();
        for record in records {
            if !merged.contains(&record) {
                merged.push(record);
            }
        }
        merged.sort_by_key(|record| record.timestamp);
        self.history = ReplyHistory::from_records(merged);
    }

    /// Records created since the last call.
    pub fn drain_new_records(&mut self) -> Vec<ReplyRecord> {
        std::mem::take(&mut self.new_records)
    }

    /// Runs one pass. Only fatal errors (bad credentials, a rejected
    /// session) are returned; everything else is counted in the report.
    pub async fn run_once(&mut self) -> Result<RunReport, CoreError> {
        let mut report = RunReport::default();

        if self.config.disabled {
            info!("Responder is disabled, skipping run");
            return Ok(report);
        }

        let session = self
            .client
            .authenticate(&self.config.handle, &self.config.password)
            .await
            .map_err(|e| {
                e.log_error();
                e
            })?;
        let our_handle = session.handle;

        let started = self.clock.now();
        let cutoff = started - Duration::hours(i64::from(self.config.max_post_age_hours));
        let hashtags = self.config.hashtags.clone();

        for hashtag in &hashtags {
            let candidates = self.collect_candidates(hashtag, &mut report).await?;
            let fresh: Vec<CandidatePost> = candidates
                .into_iter()
                .filter(|post| post.indexed_at >= cutoff)
                .collect();
            info!(hashtag = %hashtag, "{} recent candidate posts", fresh.len());
            report.candidates += fresh.len();

            for post in &fresh {
                match self.process_post(post, hashtag, &our_handle).await {
                    Ok(PostOutcome::Replied(_)) => report.processed += 1,
                    Ok(PostOutcome::Skipped(reason)) => {
                        debug!(hashtag = %hashtag, uri = %post.uri, "Skipped: {:?}", reason);
                        report.skipped += 1;
                    }
                    Err(e) => {
                        if ErrorRecovery::determine_strategy(&e) == RecoveryStrategy::Fail {
                            e.log_error();
                            return Err(e);
                        }
                        warn!(hashtag = %hashtag, uri = %post.uri, "Reply failed: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }

        let pruned = self.history.prune(self.clock.now());
        if pruned > 0 {
            debug!("Pruned {} expired reply records", pruned);
        }

        info!(
            "Run complete: {} replied, {} skipped, {} failed of {} candidates",
            report.processed, report.skipped, report.failed, report.candidates
        );
        Ok(report)
    }

    /// Search results for `hashtag`, unioned across query variants and
    /// deduplicated by uri in first-seen order.
    async fn collect_candidates(
        &self,
        hashtag: &str,
        report: &mut RunReport,
    ) -> Result<Vec<CandidatePost>, CoreError> {
        let queries = match self.config.search_strategy {
            SearchStrategy::Single => vec![hashtag.to_string()],
            SearchStrategy::CaseVariants => self.matcher.variants(hashtag),
        };

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        for query in queries {
            report.searched += 1;
            let result = self.client.search_posts(&query, self.config.search_limit).await;
            let found = match ErrorRecovery::recover(result, Vec::new) {
                RecoveryResult::Recovered(found) | RecoveryResult::Degraded(found) => found,
                RecoveryResult::Skipped => {
                    warn!("Search for {} failed, treating as empty", query);
                    Vec::new()
                }
                RecoveryResult::Failed(e) => {
                    e.log_error();
                    return Err(e);
                }
            };
            debug!("Search {} returned {} posts", query, found.len());
            for post in found {
                if seen.insert(post.uri.clone()) {
                    posts.push(post);
                }
            }
        }
        Ok(posts)
    }

    /// Checks run in order and the first failing one decides.
    pub async fn process_post(
        &mut self,
        post: &CandidatePost,
        hashtag: &str,
        our_handle: &str,
    ) -> Result<PostOutcome, CoreError> {
        if post.author_handle.eq_ignore_ascii_case(our_handle) {
            return Ok(PostOutcome::Skipped(SkipReason::OwnPost));
        }
        if !self.matcher.matches(&post.text, hashtag) {
            return Ok(PostOutcome::Skipped(SkipReason::NoExactMatch));
        }

        let strategy = self.config.duplicate_strategy;
        if strategy.checks_local() && self.history.has_replied(&post.uri, hashtag) {
            return Ok(PostOutcome::Skipped(SkipReason::AlreadyReplied));
        }
        if strategy.checks_remote()
            && has_replied_remote(self.client.as_ref(), &post.uri, our_handle).await
        {
            return Ok(PostOutcome::Skipped(SkipReason::RepliedInThread));
        }

        let rule = self.catalog.rule(hashtag);
        let cooldown = self
            .config
            .effective_cooldown(rule.and_then(|rule| rule.cooldown_minutes));
        let now = self.clock.now();
        if self.history.in_cooldown(hashtag, now, cooldown) {
            return Ok(PostOutcome::Skipped(SkipReason::Cooldown));
        }

        let mode = self
            .config
            .response_mode
            .or(rule.map(|rule| rule.selection_mode))
            .unwrap_or_default();
        let local_now = wall_clock(now, self.config.utc_offset_minutes);
        let variant = self.catalog.select(hashtag, mode, local_now, &mut self.rng);

        let composer = ReplyComposer::new(self.client.as_ref(), self.assets.as_ref());
        let draft = composer.compose(post, rule, &variant, &mut self.rng).await?;
        let created = self.client.submit_post(&draft).await?;
        info!(hashtag = %hashtag, uri = %post.uri, reply = %created.uri, "Replied");

        let record = self
            .history
            .record(&post.uri, hashtag, self.clock.now())
            .clone();
        self.new_records.push(record.clone());
        Ok(PostOutcome::Replied(record))
    }
}
