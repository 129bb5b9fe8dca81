//! Error recovery strategies for the reply pipeline.
//!
//! Nothing is retried inside a run. Each error is mapped to how the current
//! item should degrade: skipped, continued without enrichment, treated as
//! "already replied", or escalated to abort the run.

use crate::{CoreError, ErrorExt, SocialApiError};
use tracing::{info, warn};

/// Recovery strategy for handling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Skip the current item and continue with the next one
    Skip,
    /// Continue the current item without the optional enrichment
    Degrade,
    /// Treat the uncertain check as a positive answer (already replied)
    FailClosed,
    /// Abort the whole run
    Fail,
}

/// Result of an error recovery attempt
#[derive(Debug)]
pub enum RecoveryResult<T> {
    /// The operation succeeded
    Recovered(T),
    /// The operation failed, continue with the degraded value
    Degraded(T),
    /// The operation failed, the item should be skipped
    Skipped,
    /// The operation failed, error should be propagated
    Failed(CoreError),
}

impl<T> RecoveryResult<T> {
    /// Returns true if the operation succeeded
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryResult::Recovered(_))
    }

    /// Returns true if the operation continues with degraded functionality
    pub fn is_degraded(&self) -> bool {
        matches!(self, RecoveryResult::Degraded(_))
    }

    /// Returns true if the item should be skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, RecoveryResult::Skipped)
    }

    /// Returns true if the error should be propagated
    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryResult::Failed(_))
    }

    /// Returns the value if recovered or degraded
    pub fn value(self) -> Option<T> {
        match self {
            RecoveryResult::Recovered(value) | RecoveryResult::Degraded(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the error if failed, None otherwise
    pub fn err(self) -> Option<CoreError> {
        match self {
            RecoveryResult::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Error recovery handler that provides strategies for different error types
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        if error.is_fatal() {
            return RecoveryStrategy::Fail;
        }

        match error {
            CoreError::SocialApi(api_error) => match api_error {
                // Unreliable duplicate detection must not lead to a second reply
                SocialApiError::ThreadFetchFailed { .. } => RecoveryStrategy::FailClosed,
                SocialApiError::UploadFailed { .. } | SocialApiError::MetadataFailed { .. } => {
                    RecoveryStrategy::Degrade
                }
                _ => RecoveryStrategy::Skip,
            },
            CoreError::Internal { .. } => RecoveryStrategy::Fail,
            _ => RecoveryStrategy::Skip,
        }
    }

    /// Apply the strategy chosen for `result`'s error, using `degraded` as the
    /// fallback value for `Degrade` and `FailClosed`.
    pub fn recover<T, F>(result: Result<T, CoreError>, degraded: F) -> RecoveryResult<T>
    where
        F: FnOnce() -> T,
    {
        let error = match result {
            Ok(value) => return RecoveryResult::Recovered(value),
            Err(error) => error,
        };

        match Self::determine_strategy(&error) {
            RecoveryStrategy::Skip => {
                warn!("Skipping item: {}", error.user_friendly_message());
                RecoveryResult::Skipped
            }
            RecoveryStrategy::Degrade | RecoveryStrategy::FailClosed => {
                info!("Continuing with fallback after error: {}", error);
                RecoveryResult::Degraded(degraded())
            }
            RecoveryStrategy::Fail => RecoveryResult::Failed(error),
        }
    }
}
