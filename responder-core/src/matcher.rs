use crate::{ConfigError, CoreError};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a hashtag is located inside post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// `#tag` must not be followed by another alphanumeric character.
    #[default]
    Exact,
    /// Plain case-insensitive containment.
    Substring,
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "strict" => Ok(Self::Exact),
            "substring" | "contains" => Ok(Self::Substring),
            other => Err(format!("unknown match mode '{other}'")),
        }
    }
}

/// Lowercases a tag and gives it exactly one leading `#`.
pub fn normalize_hashtag(raw: &str) -> Result<String, CoreError> {
    let base = raw.trim().trim_start_matches('#');
    if base.is_empty() || base.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            field: "hashtag".to_string(),
            value: raw.to_string(),
        }
        .into());
    }
    Ok(format!("#{}", base.to_lowercase()))
}

#[derive(Debug, Clone, Default)]
pub struct HashtagMatcher {
    mode: MatchMode,
    /// Extra spellings keyed by lowercase base word (no `#`).
    special_cases: HashMap<String, Vec<String>>,
}

impl HashtagMatcher {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            special_cases: HashMap::new(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Registers historically observed spellings for a base word.
    pub fn with_special_case<I, S>(mut self, hashtag: &str, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = base_word(hashtag).to_lowercase();
        let entry = self.special_cases.entry(key).or_default();
        for form in forms {
            let form = form.into();
            let form = format!("#{}", base_word(&form));
            if !entry.contains(&form) {
                entry.push(form);
            }
        }
        self
    }

    /// Search-query spellings for a tag, in insertion order without duplicates.
    pub fn variants(&self, hashtag: &str) -> Vec<String> {
        let base = base_word(hashtag);
        let mut out: Vec<String> = Vec::new();
        let mut push = |candidate: String| {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        };

        push(format!("#{}", base.to_lowercase()));
        push(format!("#{}", base.to_uppercase()));
        push(format!("#{}", capitalize(base)));

        if let Some(extra) = self.special_cases.get(&base.to_lowercase()) {
            for form in extra {
                push(form.clone());
            }
        }

        out
    }

    pub fn matches(&self, text: &str, hashtag: &str) -> bool {
        let needle = format!("#{}", base_word(hashtag));
        match self.mode {
            MatchMode::Substring => text.to_lowercase().contains(&needle.to_lowercase()),
            MatchMode::Exact => contains_whole_tag(text, &needle),
        }
    }
}

fn base_word(hashtag: &str) -> &str {
    hashtag.trim().trim_start_matches('#')
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().to_lowercase();
            first.to_uppercase().chain(rest.chars()).collect()
        }
        None => String::new(),
    }
}

fn contains_whole_tag(text: &str, needle: &str) -> bool {
    let pattern = match RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(_) => return false,
    };

    let whole = pattern.find_iter(text).any(|found| {
        text[found.end()..]
            .chars()
            .next()
            .map_or(true, |next| !next.is_alphanumeric())
    });
    whole
}
