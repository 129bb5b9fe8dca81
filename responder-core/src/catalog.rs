use crate::matcher::normalize_hashtag;
use crate::time_selector::{EventSchedule, ScheduleConfig};
use crate::{
    ConfigError, CoreError, HashtagRule, ResponseVariant, SelectionMode, MAX_POST_CHARS,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_CATALOG: &str = include_str!("../catalog/default.toml");

const DEFAULT_FALLBACK_TEMPLATE: &str =
    "Thanks for using {hashtag}! Join us for the BlueSky Show every Friday at 3:30 PM Central!";

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    fallback_template: Option<String>,
    #[serde(default)]
    schedule: Option<ScheduleConfig>,
    #[serde(default)]
    rules: Vec<HashtagRule>,
}

/// Per-hashtag response pools plus the weekly schedule used for
/// time-based selection.
#[derive(Debug, Clone)]
pub struct ResponseCatalog {
    rules: Vec<HashtagRule>,
    schedule: Option<EventSchedule>,
    fallback_template: String,
}

impl ResponseCatalog {
    pub fn new(rules: Vec<HashtagRule>, schedule: Option<EventSchedule>) -> Result<Self, CoreError> {
        let rules = rules
            .into_iter()
            .map(validate_rule)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            schedule,
            fallback_template: DEFAULT_FALLBACK_TEMPLATE.to_string(),
        })
    }

    pub fn with_fallback_template(mut self, template: impl Into<String>) -> Self {
        self.fallback_template = template.into();
        self
    }

    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, CoreError> {
        let file: CatalogFile = toml::from_str(source).map_err(ConfigError::from)?;
        let schedule = file
            .schedule
            .as_ref()
            .map(EventSchedule::from_config)
            .transpose()?;

        let catalog = Self::new(file.rules, schedule)?;
        Ok(match file.fallback_template {
            Some(template) => catalog.with_fallback_template(template),
            None => catalog,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
            _ => CoreError::Io(e),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn rules(&self) -> &[HashtagRule] {
        &self.rules
    }

    pub fn schedule(&self) -> Option<&EventSchedule> {
        self.schedule.as_ref()
    }

    pub fn rule(&self, hashtag: &str) -> Option<&HashtagRule> {
        let wanted = normalize_hashtag(hashtag).ok()?;
        self.rules.iter().find(|rule| rule.hashtag == wanted)
    }

    pub fn cooldown_minutes(&self, hashtag: &str, default_minutes: u32) -> u32 {
        self.rule(hashtag)
            .and_then(|rule| rule.cooldown_minutes)
            .unwrap_or(default_minutes)
    }

    /// Generic reply used when no rule (or no usable variant) exists.
    pub fn fallback(&self, hashtag: &str) -> ResponseVariant {
        ResponseVariant::text(self.fallback_template.replace("{hashtag}", hashtag))
    }

    /// Picks the reply for `hashtag`.
    ///
    /// `now` is the pre-localized wall clock consulted in time-based mode.
    pub fn select(
        &self,
        hashtag: &str,
        mode: SelectionMode,
        now: NaiveDateTime,
        rng: &mut fastrand::Rng,
    ) -> ResponseVariant {
        let Some(rule) = self.rule(hashtag) else {
            debug!("No response rule for {}, using fallback", hashtag);
            return self.fallback(hashtag);
        };

        let chosen = match mode {
            SelectionMode::Random => {
                if rule.response_variants.is_empty() {
                    None
                } else {
                    rule.response_variants
                        .get(rng.usize(..rule.response_variants.len()))
                }
            }
            SelectionMode::FixedFirst => rule.response_variants.first(),
            SelectionMode::TimeBased => self.time_based(rule, now),
        };

        chosen.cloned().unwrap_or_else(|| self.fallback(hashtag))
    }

    fn time_based<'a>(&self, rule: &'a HashtagRule, now: NaiveDateTime) -> Option<&'a ResponseVariant> {
        let Some(schedule) = &self.schedule else {
            warn!(
                "Time-based selection requested for {} without a schedule, using first variant",
                rule.hashtag
            );
            return rule.response_variants.first();
        };

        let index = schedule.select(now);
        debug!("Time window for {} resolved to variant {}", rule.hashtag, index);

        rule.time_sensitive_variants
            .as_ref()
            .and_then(|variants| variants.get(index))
            .or_else(|| rule.response_variants.get(index))
            .or_else(|| rule.response_variants.first())
    }
}

/// Appends the rule's website as a trailing line unless an embed already
/// carries a link or the result would exceed the post length limit.
pub fn append_website_link(rule: Option<&HashtagRule>, text: &str, embed_carries_link: bool) -> String {
    let Some(url) = rule
        .filter(|rule| rule.include_link)
        .and_then(|rule| rule.website_url.as_deref())
    else {
        return text.to_string();
    };

    if embed_carries_link || text.contains(url) {
        return text.to_string();
    }

    let combined = format!("{text}\n\n{url}");
    if combined.chars().count() > MAX_POST_CHARS {
        warn!("Skipping website link, reply would exceed {} characters", MAX_POST_CHARS);
        return text.to_string();
    }
    combined
}

fn validate_rule(mut rule: HashtagRule) -> Result<HashtagRule, CoreError> {
    rule.hashtag = normalize_hashtag(&rule.hashtag)?;

    let all_variants = rule
        .response_variants
        .iter()
        .chain(rule.time_sensitive_variants.iter().flatten());

    for variant in all_variants {
        let length = variant.text.chars().count();
        if length > MAX_POST_CHARS {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "response for {} is {} characters, limit is {}",
                    rule.hashtag, length, MAX_POST_CHARS
                ),
            }
            .into());
        }
        if let Some(link) = &variant.link_url {
            validate_url("link_url", link)?;
        }
    }

    for link in &rule.link_cards {
        validate_url("link_cards", link)?;
    }
    if let Some(site) = &rule.website_url {
        validate_url("website_url", site)?;
    }

    Ok(rule)
}

fn validate_url(field: &str, value: &str) -> Result<(), CoreError> {
    url::Url::parse(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn at(weekday: Weekday, hour: u32) -> NaiveDateTime {
        NaiveDate::from_isoywd_opt(2026, 42, weekday)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn rule(variants: &[&str], timed: Option<&[&str]>) -> HashtagRule {
        HashtagRule {
            hashtag: "#Foo".to_string(),
            response_variants: variants.iter().map(|t| ResponseVariant::text(*t)).collect(),
            time_sensitive_variants: timed
                .map(|list| list.iter().map(|t| ResponseVariant::text(*t)).collect()),
            cooldown_minutes: Some(15),
            selection_mode: SelectionMode::Random,
            link_cards: Vec::new(),
            website_url: None,
            include_link: false,
            extra_variants: Vec::new(),
        }
    }

    fn schedule() -> EventSchedule {
        EventSchedule::new(
            Weekday::Fri,
            NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ResponseCatalog::builtin().unwrap();
        let rule = catalog.rule("#TheBlueskyShow").unwrap();
        assert_eq!(rule.hashtag, "#theblueskyshow");
        assert_eq!(rule.response_variants.len(), 6);
        assert_eq!(rule.time_sensitive_variants.as_ref().unwrap().len(), 5);
        assert!(catalog.schedule().is_some());
        assert_eq!(catalog.cooldown_minutes("#theblueskyshow", 60), 30);
        assert_eq!(catalog.cooldown_minutes("#unknown", 60), 60);
    }

    #[test]
    fn test_unknown_hashtag_uses_fallback() {
        let catalog = ResponseCatalog::new(vec![], None).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        let variant = catalog.select("#other", SelectionMode::Random, at(Weekday::Mon, 9), &mut rng);
        assert!(variant.text.contains("#other"));
        assert!(variant.image_ref.is_none());
    }

    #[test]
    fn test_random_stays_within_plain_variants() {
        let catalog = ResponseCatalog::new(vec![rule(&["a", "b", "c"], Some(&["t"]))], None).unwrap();
        let mut rng = fastrand::Rng::with_seed(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let variant = catalog.select("#foo", SelectionMode::Random, at(Weekday::Mon, 9), &mut rng);
            assert!(["a", "b", "c"].contains(&variant.text.as_str()));
            seen.insert(variant.text);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_fixed_first() {
        let catalog = ResponseCatalog::new(vec![rule(&["a", "b"], None)], None).unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..10 {
            let variant = catalog.select("foo", SelectionMode::FixedFirst, at(Weekday::Mon, 9), &mut rng);
            assert_eq!(variant.text, "a");
        }
    }

    #[test]
    fn test_time_based_falls_back_to_plain_list() {
        let rules = vec![rule(&["p0", "p1", "p2", "p3", "p4"], Some(&["t0", "t1"]))];
        let catalog = ResponseCatalog::new(rules, Some(schedule())).unwrap();
        let mut rng = fastrand::Rng::with_seed(1);

        let eve = catalog.select("#foo", SelectionMode::TimeBased, at(Weekday::Thu, 10), &mut rng);
        assert_eq!(eve.text, "t1");

        let live = catalog.select("#foo", SelectionMode::TimeBased, at(Weekday::Fri, 16), &mut rng);
        assert_eq!(live.text, "p3");
    }

    #[test]
    fn test_time_based_without_schedule_uses_first() {
        let catalog = ResponseCatalog::new(vec![rule(&["a", "b"], Some(&["t0"]))], None).unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        let variant = catalog.select("#foo", SelectionMode::TimeBased, at(Weekday::Thu, 10), &mut rng);
        assert_eq!(variant.text, "a");
    }

    #[test]
    fn test_rejects_overlong_response() {
        let long = "x".repeat(MAX_POST_CHARS + 1);
        let result = ResponseCatalog::new(vec![rule(&[long.as_str()], None)], None);
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::ValidationFailed { .. }))
        ));
    }

    #[test]
    fn test_append_website_link() {
        let mut with_site = rule(&["a"], None);
        with_site.website_url = Some("https://example.com".to_string());
        with_site.include_link = true;

        assert_eq!(
            append_website_link(Some(&with_site), "hello", false),
            "hello\n\nhttps://example.com"
        );
        assert_eq!(append_website_link(Some(&with_site), "hello", true), "hello");
        assert_eq!(append_website_link(None, "hello", false), "hello");

        let near_limit = "y".repeat(MAX_POST_CHARS - 5);
        assert_eq!(append_website_link(Some(&with_site), &near_limit, false), near_limit);

        with_site.include_link = false;
        assert_eq!(append_website_link(Some(&with_site), "hello", false), "hello");
    }

    #[test]
    fn test_toml_catalog_with_custom_table() {
        let source = r##"
            fallback_template = "Hi from {hashtag}"

            [schedule]
            weekday = "Wed"
            start = "20:00"
            end = "21:00"
            window_indices = [0, 1, 2, 0, 0]

            [[rules]]
            hashtag = "RustLang"
            selection_mode = "time-based"

            [[rules.responses]]
            text = "far"

            [[rules.responses]]
            text = "eve"
        "##;
        let catalog = ResponseCatalog::from_toml_str(source).unwrap();
        let rule = catalog.rule("#rustlang").unwrap();
        assert_eq!(rule.selection_mode, SelectionMode::TimeBased);
        assert_eq!(catalog.fallback("#x").text, "Hi from #x");

        let mut rng = fastrand::Rng::with_seed(3);
        let tuesday = catalog.select("#rustlang", SelectionMode::TimeBased, at(Weekday::Tue, 12), &mut rng);
        assert_eq!(tuesday.text, "eve");
    }
}
