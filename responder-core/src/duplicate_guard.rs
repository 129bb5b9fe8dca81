use crate::error_recovery::{ErrorRecovery, RecoveryResult};
use crate::{CoreError, ReplyRecord, SocialClient};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Records older than this are dropped by [`ReplyHistory::prune`].
pub const HISTORY_RETENTION_HOURS: i64 = 24;

/// Reply-thread depth inspected by the remote duplicate check.
pub const REMOTE_THREAD_DEPTH: u32 = 2;

/// Which duplicate checks run before replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateStrategy {
    /// In-process history only
    Local,
    /// Reply-thread inspection only
    Remote,
    /// History first, then the thread
    #[default]
    Both,
}

impl DuplicateStrategy {
    pub fn checks_local(self) -> bool {
        matches!(self, Self::Local | Self::Both)
    }

    pub fn checks_remote(self) -> bool {
        matches!(self, Self::Remote | Self::Both)
    }
}

impl std::str::FromStr for DuplicateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "history" => Ok(Self::Local),
            "remote" | "thread" => Ok(Self::Remote),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown duplicate strategy '{other}'")),
        }
    }
}

/// Append-only log of replies made by this process.
#[derive(Debug, Clone, Default)]
pub struct ReplyHistory {
    records: Vec<ReplyRecord>,
}

impl ReplyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ReplyRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ReplyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_replied(&self, post_uri: &str, hashtag: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.post_uri == post_uri && record.hashtag == hashtag)
    }

    pub fn record(&mut self, post_uri: &str, hashtag: &str, now: DateTime<Utc>) -> &ReplyRecord {
        self.records.push(ReplyRecord {
            post_uri: post_uri.to_string(),
            hashtag: hashtag.to_string(),
            timestamp: now,
        });
        &self.records[self.records.len() - 1]
    }

    /// Drops records with `timestamp < now - 24h`; returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(HISTORY_RETENTION_HOURS);
        let before = self.records.len();
        self.records.retain(|record| record.timestamp >= cutoff);
        let removed = before - self.records.len();
        if removed > 0 {
            debug!("Pruned {} reply records older than {}", removed, cutoff);
        }
        removed
    }

    pub fn in_cooldown(&self, hashtag: &str, now: DateTime<Utc>, cooldown_minutes: u32) -> bool {
        in_cooldown(hashtag, &self.records, now, cooldown_minutes)
    }
}

/// True iff a record for `hashtag` lies within `cooldown_minutes` of `now`.
pub fn in_cooldown(
    hashtag: &str,
    history: &[ReplyRecord],
    now: DateTime<Utc>,
    cooldown_minutes: u32,
) -> bool {
    if cooldown_minutes == 0 {
        return false;
    }
    let window = Duration::minutes(i64::from(cooldown_minutes));
    history
        .iter()
        .filter(|record| record.hashtag == hashtag)
        .any(|record| {
            let elapsed = now - record.timestamp;
            elapsed >= Duration::zero() && elapsed < window
        })
}

/// Looks for a reply authored by `our_handle` anywhere in the post's thread.
///
/// A failed fetch answers `true` so that an unreliable check never leads to
/// a second reply.
pub async fn has_replied_remote(
    client: &dyn SocialClient,
    post_uri: &str,
    our_handle: &str,
) -> bool {
    let lookup: Result<bool, CoreError> = client
        .get_reply_thread(post_uri, REMOTE_THREAD_DEPTH)
        .await
        .map(|thread| {
            debug!("Inspecting {} direct replies of {}", thread.replies.len(), post_uri);
            thread.has_reply_from(our_handle)
        });

    match ErrorRecovery::recover(lookup, || true) {
        RecoveryResult::Recovered(found) => {
            if found {
                info!("Found an existing reply from @{} on {}", our_handle, post_uri);
            }
            found
        }
        RecoveryResult::Degraded(assumed) => {
            warn!("Assuming {} was already answered, thread check failed", post_uri);
            assumed
        }
        RecoveryResult::Skipped | RecoveryResult::Failed(_) => {
            warn!("Thread check for {} unusable, treating as already replied", post_uri);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_record_then_has_replied() {
        let mut history = ReplyHistory::new();
        assert!(!history.has_replied("at://post/1", "#foo"));

        history.record("at://post/1", "#foo", t0());
        assert!(history.has_replied("at://post/1", "#foo"));
        assert!(!history.has_replied("at://post/1", "#bar"));
        assert!(!history.has_replied("at://post/2", "#foo"));

        history.prune(t0() + Duration::hours(23));
        assert!(history.has_replied("at://post/1", "#foo"));
    }

    #[test]
    fn test_prune_only_removes_expired() {
        let mut history = ReplyHistory::new();
        history.record("at://old", "#foo", t0() - Duration::hours(25));
        history.record("at://edge", "#foo", t0() - Duration::hours(24));
        history.record("at://fresh", "#foo", t0() - Duration::minutes(5));

        let removed = history.prune(t0());
        assert_eq!(removed, 1);
        assert!(!history.has_replied("at://old", "#foo"));
        assert!(history.has_replied("at://edge", "#foo"));
        assert!(history.has_replied("at://fresh", "#foo"));
    }

    #[test]
    fn test_cooldown_window() {
        let mut history = ReplyHistory::new();
        history.record("at://post/1", "#foo", t0());

        assert!(history.in_cooldown("#foo", t0() + Duration::minutes(29), 30));
        assert!(!history.in_cooldown("#foo", t0() + Duration::minutes(31), 30));
        assert!(!history.in_cooldown("#bar", t0() + Duration::minutes(1), 30));
        assert!(!history.in_cooldown("#foo", t0() + Duration::minutes(1), 0));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("local".parse::<DuplicateStrategy>().unwrap(), DuplicateStrategy::Local);
        assert_eq!("BOTH".parse::<DuplicateStrategy>().unwrap(), DuplicateStrategy::Both);
        assert!(DuplicateStrategy::Remote.checks_remote());
        assert!(!DuplicateStrategy::Remote.checks_local());
        assert!("never".parse::<DuplicateStrategy>().is_err());
    }
}
