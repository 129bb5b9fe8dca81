use crate::duplicate_guard::DuplicateStrategy;
use crate::matcher::{normalize_hashtag, MatchMode};
use crate::{ConfigError, CoreError, SelectionMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_HASHTAGS: &str = "#theblueskyshow";

/// How candidate posts are gathered for a hashtag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// One search with the normalized tag
    Single,
    /// One search per case variant, results merged by uri
    #[default]
    CaseVariants,
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "case-variants" | "variants" => Ok(Self::CaseVariants),
            other => Err(format!("unknown search strategy '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub handle: String,
    pub password: String,
    pub service_url: String,
    /// Normalized tags, processed in this order.
    pub hashtags: Vec<String>,
    pub default_cooldown_minutes: u32,
    pub cooldown_enabled: bool,
    pub max_post_age_hours: u32,
    pub disabled: bool,
    /// Overrides every rule's own selection mode when set.
    pub response_mode: Option<SelectionMode>,
    pub duplicate_strategy: DuplicateStrategy,
    pub search_strategy: SearchStrategy,
    pub search_limit: u32,
    pub match_mode: MatchMode,
    pub utc_offset_minutes: i32,
    pub catalog_path: Option<PathBuf>,
    pub assets_dir: PathBuf,
    pub history_db: Option<String>,
    pub poll_interval_minutes: u64,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("handle", &self.handle)
            .field("password", &"<redacted>")
            .field("service_url", &self.service_url)
            .field("hashtags", &self.hashtags)
            .field("default_cooldown_minutes", &self.default_cooldown_minutes)
            .field("cooldown_enabled", &self.cooldown_enabled)
            .field("max_post_age_hours", &self.max_post_age_hours)
            .field("disabled", &self.disabled)
            .field("response_mode", &self.response_mode)
            .field("duplicate_strategy", &self.duplicate_strategy)
            .field("search_strategy", &self.search_strategy)
            .field("search_limit", &self.search_limit)
            .field("match_mode", &self.match_mode)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("catalog_path", &self.catalog_path)
            .field("assets_dir", &self.assets_dir)
            .field("history_db", &self.history_db)
            .field("poll_interval_minutes", &self.poll_interval_minutes)
            .finish()
    }
}

impl AppConfig {
    /// Defaults for everything except the credentials.
    pub fn new(handle: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            password: password.into(),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            hashtags: vec![DEFAULT_HASHTAGS.to_string()],
            default_cooldown_minutes: 30,
            cooldown_enabled: true,
            max_post_age_hours: 24,
            disabled: false,
            response_mode: None,
            duplicate_strategy: DuplicateStrategy::default(),
            search_strategy: SearchStrategy::default(),
            search_limit: 25,
            match_mode: MatchMode::default(),
            utc_offset_minutes: 0,
            catalog_path: None,
            assets_dir: PathBuf::from("assets"),
            history_db: None,
            poll_interval_minutes: 2,
        }
    }

    pub fn with_hashtags<I, S>(mut self, hashtags: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for tag in hashtags {
            let tag = normalize_hashtag(tag.as_ref())?;
            if !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        if normalized.is_empty() {
            return Err(ConfigError::MissingField {
                field: "HASHTAGS".to_string(),
            }
            .into());
        }
        self.hashtags = normalized;
        Ok(self)
    }

    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CoreError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let handle = get("BLUESKY_HANDLE")
            .or_else(|| get("BLUESKY_USERNAME"))
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: "BLUESKY_HANDLE".to_string(),
            })?;
        let password = get("BLUESKY_PASSWORD").ok_or_else(|| {
            ConfigError::MissingEnvironmentVariable {
                var_name: "BLUESKY_PASSWORD".to_string(),
            }
        })?;

        let mut config = Self::new(handle.trim_start_matches('@'), password).with_hashtags(
            get("HASHTAGS")
                .unwrap_or(DEFAULT_HASHTAGS)
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty()),
        )?;

        if let Some(url) = get("BLUESKY_SERVICE") {
            url::Url::parse(url).map_err(|_| invalid("BLUESKY_SERVICE", url))?;
            config.service_url = url.trim_end_matches('/').to_string();
        }
        if let Some(value) = get("REPLY_INTERVAL_MINUTES") {
            config.default_cooldown_minutes = parse_var("REPLY_INTERVAL_MINUTES", value)?;
        }
        if let Some(value) = get("COOLDOWN_ENABLED") {
            config.cooldown_enabled = parse_flag("COOLDOWN_ENABLED", value)?;
        }
        if let Some(value) = get("MAX_POST_AGE_HOURS") {
            config.max_post_age_hours = parse_var("MAX_POST_AGE_HOURS", value)?;
        }
        if let Some(value) = get("BOT_DISABLED") {
            config.disabled = parse_flag("BOT_DISABLED", value)?;
        }
        if let Some(value) = get("RESPONSE_MODE") {
            config.response_mode = Some(parse_var("RESPONSE_MODE", value)?);
        }
        if let Some(value) = get("DUPLICATE_STRATEGY") {
            config.duplicate_strategy = parse_var("DUPLICATE_STRATEGY", value)?;
        }
        if let Some(value) = get("SEARCH_STRATEGY") {
            config.search_strategy = parse_var("SEARCH_STRATEGY", value)?;
        }
        if let Some(value) = get("SEARCH_LIMIT") {
            config.search_limit = parse_var("SEARCH_LIMIT", value)?;
            if !(1..=100).contains(&config.search_limit) {
                return Err(invalid("SEARCH_LIMIT", value).into());
            }
        }
        if let Some(value) = get("MATCH_MODE") {
            config.match_mode = parse_var("MATCH_MODE", value)?;
        }
        if let Some(value) = get("UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = parse_var("UTC_OFFSET_MINUTES", value)?;
            if config.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
                return Err(invalid("UTC_OFFSET_MINUTES", value).into());
            }
        }
        if let Some(path) = get("RESPONDER_CATALOG") {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("ASSETS_DIR") {
            config.assets_dir = PathBuf::from(path);
        }
        if let Some(url) = get("HISTORY_DB") {
            config.history_db = Some(url.to_string());
        }
        if let Some(value) = get("POLL_INTERVAL_MINUTES") {
            config.poll_interval_minutes = parse_var("POLL_INTERVAL_MINUTES", value)?;
            if config.poll_interval_minutes == 0 {
                return Err(invalid("POLL_INTERVAL_MINUTES", value).into());
            }
        }

        Ok(config)
    }

    /// Cooldown that applies to `hashtag`, zero when cooldowns are disabled.
    pub fn effective_cooldown(&self, rule_cooldown: Option<u32>) -> u32 {
        if self.cooldown_enabled {
            rule_cooldown.unwrap_or(self.default_cooldown_minutes)
        } else {
            0
        }
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_var<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(field, value))
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}
