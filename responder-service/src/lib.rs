pub mod assets;
pub mod orchestrator;
pub mod reply;

pub use assets::{AssetSource, InMemoryAssets, LocalAssetDir};
pub use orchestrator::{PostOutcome, ReplyOrchestrator, SkipReason};
pub use reply::ReplyComposer;

use chrono::Duration as ChronoDuration;
use reply_store::ReplyStore;
use responder_core::duplicate_guard::HISTORY_RETENTION_HOURS;
use responder_core::{CoreError, ErrorExt, RunReport};
use tracing::{error, info, warn};

/// Drives the orchestrator either once or on a fixed interval, keeping an
/// optional on-disk copy of the reply history in sync.
pub struct BackgroundService {
    orchestrator: ReplyOrchestrator,
    store: Option<ReplyStore>,
    history_loaded: bool,
    polling_interval: std::time::Duration,
}

impl BackgroundService {
    pub fn new(orchestrator: ReplyOrchestrator, polling_interval_minutes: u64) -> Self {
        Self {
            orchestrator,
            store: None,
            history_loaded: false,
            polling_interval: std::time::Duration::from_secs(polling_interval_minutes.max(1) * 60),
        }
    }

    /// `store` must already be connected and migrated.
    pub fn with_store(mut self, store: ReplyStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn orchestrator(&self) -> &ReplyOrchestrator {
        &self.orchestrator
    }

    pub fn polling_interval(&self) -> std::time::Duration {
        self.polling_interval
    }

    pub async fn run_once(&mut self) -> Result<RunReport, CoreError> {
        self.load_history().await;
        let report = self.orchestrator.run_once().await;
        // Replies that did go out are persisted even when the pass aborted.
        self.persist_history().await;
        report
    }

    /// Repeats passes until Ctrl+C or a fatal error.
    pub async fn start(&mut self) -> Result<(), CoreError> {
        info!(
            "Watching hashtags every {} seconds",
            self.polling_interval.as_secs()
        );
        let mut interval = tokio::time::interval(self.polling_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) => info!(
                            "Pass finished: {} replied, {} skipped, {} failed",
                            report.processed, report.skipped, report.failed
                        ),
                        Err(e) if e.is_fatal() => {
                            error!("Stopping after fatal error: {}", e.user_friendly_message());
                            return Err(e);
                        }
                        Err(e) => {
                            e.log_warn();
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping watch loop");
                    break;
                }
            }
        }

        self.stop().await;
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }

    async fn load_history(&mut self) {
        if self.history_loaded {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };

        let since = self.orchestrator.now() - ChronoDuration::hours(HISTORY_RETENTION_HOURS);
        match store.load_since(since).await {
            Ok(records) => {
                info!("Loaded {} recent replies from history store", records.len());
                self.orchestrator.merge_history(records);
                self.history_loaded = true;
            }
            Err(e) => {
                warn!("Could not load reply history: {}", e);
            }
        }
    }

    async fn persist_history(&mut self) {
        let records = self.orchestrator.drain_new_records();
        let Some(store) = &self.store else {
            return;
        };

        for record in &records {
            if let Err(e) = store.save_reply(record).await {
                warn!("Could not save reply to {}: {}", record.post_uri, e);
            }
        }

        let cutoff = self.orchestrator.now() - ChronoDuration::hours(HISTORY_RETENTION_HOURS);
        if let Err(e) = store.prune_before(cutoff).await {
            e.log_warn();
        }
    }
}
