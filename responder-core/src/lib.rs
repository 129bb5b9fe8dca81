pub mod catalog;
pub mod client;
pub mod clock;
pub mod config;
pub mod duplicate_guard;
pub mod error;
pub mod error_recovery;
pub mod error_utils;
pub mod matcher;
pub mod time_selector;
pub mod types;

pub use catalog::{append_website_link, ResponseCatalog};
pub use client::SocialClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, SearchStrategy};
pub use duplicate_guard::{has_replied_remote, in_cooldown, DuplicateStrategy, ReplyHistory};
pub use error::*;
pub use error_recovery::{ErrorRecovery, RecoveryResult, RecoveryStrategy};
pub use error_utils::*;
pub use matcher::{normalize_hashtag, HashtagMatcher, MatchMode};
pub use time_selector::{wall_clock, EventSchedule, TimeWindow, WindowTable};
pub use types::*;
