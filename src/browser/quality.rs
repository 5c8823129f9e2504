use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::browser::extract::ExtractedContent;
use crate::cli::config::QualitySettings;

pub const ISSUE_SEARCH_RESULT: &str = "Search result page";
pub const ISSUE_VERY_SHORT: &str = "Very short content";
pub const ISSUE_SHORT: &str = "Short content";
pub const ISSUE_ERROR_PAGE: &str = "Error page (404)";
pub const ISSUE_PAYWALL: &str = "Possible paywall";

/// Minimum score for content to count as usable
pub const VALID_THRESHOLD: i32 = 50;

/// Assessment of whether extracted content is usable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityVerdict {
    /// 0..=100
    pub score: u32,
    pub issues: Vec<String>,
    pub is_valid: bool,
}

/// Scores extracted pages. Deductions are independent and add up.
pub struct QualityValidator {
    /// Compiled search-engine result URL patterns
    search_patterns: Vec<Regex>,

    /// Lowercase title markers of error pages
    error_markers: Vec<String>,

    /// Lowercase content markers of paywalls
    paywall_markers: Vec<String>,
}

impl QualityValidator {
    /// Create a validator from settings, skipping patterns that fail to compile
    pub fn new(settings: &QualitySettings) -> Self {
        let search_patterns = settings
            .search_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("(?i){}", pattern)) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Invalid search pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect();

        Self {
            search_patterns,
            error_markers: settings.error_markers.iter().map(|m| m.to_lowercase()).collect(),
            paywall_markers: settings.paywall_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn validate(&self, content: &ExtractedContent) -> QualityVerdict {
        let mut issues = Vec::new();
        let mut score: i32 = 100;

        if self.search_patterns.iter().any(|p| p.is_match(&content.url)) {
            issues.push(ISSUE_SEARCH_RESULT.to_string());
            score -= 80;
        }

        if content.content_length < 500 {
            issues.push(ISSUE_VERY_SHORT.to_string());
            score -= 30;
        } else if content.content_length < 1000 {
            issues.push(ISSUE_SHORT.to_string());
            score -= 15;
        }

        let title = content.title.to_lowercase();
        if self.error_markers.iter().any(|m| title.contains(m.as_str())) {
            issues.push(ISSUE_ERROR_PAGE.to_string());
            score -= 70;
        }

        if content.content_length < 2000 {
            let text = content.content.to_lowercase();
            if self.paywall_markers.iter().any(|m| text.contains(m.as_str())) {
                issues.push(ISSUE_PAYWALL.to_string());
                score -= 20;
            }
        }

        QualityVerdict {
            score: score.max(0) as u32,
            issues,
            is_valid: score >= VALID_THRESHOLD,
        }
    }
}
