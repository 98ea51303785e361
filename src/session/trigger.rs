use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::constants::DEFAULT_ANALYSIS_KEYWORDS;

static DEFAULT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    build_pattern(DEFAULT_ANALYSIS_KEYWORDS).expect("default analysis keywords form a valid pattern")
});

fn build_pattern<S: AsRef<str>>(keywords: &[S]) -> Result<Regex, regex::Error> {
    let alternation = keywords
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");

    RegexBuilder::new(&format!("(?:{})", alternation))
        .case_insensitive(true)
        .build()
}

/// Decides whether a query goes to the one-shot analysis endpoint
///
/// Case-insensitive substring match against a small keyword list. An empty
/// list never matches.
#[derive(Debug, Clone)]
pub struct AnalysisTrigger {
    pattern: Option<Regex>,
}

impl Default for AnalysisTrigger {
    fn default() -> Self {
        Self {
            pattern: Some(DEFAULT_PATTERN.clone()),
        }
    }
}

impl AnalysisTrigger {
    pub fn from_keywords<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        if keywords.iter().all(|k| k.as_ref().trim().is_empty()) {
            return Ok(Self::disabled());
        }
        Ok(Self {
            pattern: Some(build_pattern(keywords)?),
        })
    }

    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    pub fn matches(&self, query: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|p| p.is_match(query))
            .unwrap_or(false)
    }
}
