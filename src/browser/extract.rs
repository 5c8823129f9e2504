use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::browser::quality::QualityVerdict;

/// Upper bound on extracted text, in characters
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// Upper bound on collected related links
pub const MAX_RELATED_LINKS: usize = 5;

/// Content containers in order of preference; the document body is the fallback
const CONTAINER_SELECTORS: &[&str] = &["article", "[role=\"main\"]", "main", "body"];

/// Elements that never contribute text
const UNWANTED_SELECTOR: &str = "script, style, nav, header, footer, aside, \
    .advertisement, .ad, .sidebar, .comments, \
    [role=\"navigation\"], [role=\"banner\"], [role=\"complementary\"]";

/// Anchor texts that mark a link as related reading
const RELATED_MARKERS: &[&str] = &["related", "see also", "read more", "相关", "推荐", "阅读更多"];

/// A candidate follow-up link found on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub url: String,
    pub text: String,
}

/// Structured content from one page visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    /// URL the page ended up on
    pub url: String,

    /// Document title
    pub title: String,

    /// Cleaned, whitespace-collapsed text
    pub content: String,

    /// Length of `content` in characters
    pub content_length: usize,

    /// Up to five related links
    pub related_links: Vec<RelatedLink>,

    /// When the content was extracted
    pub extracted_at: DateTime<Utc>,

    /// Set once the quality validator has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityVerdict>,
}

/// What the snapshot script returns from the page context
#[derive(Debug, Clone, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
}

impl PageSnapshot {
    /// Decode the snapshot script's result
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            anyhow::bail!("page returned no snapshot");
        }
        serde_json::from_value(value).map_err(|e| anyhow!("malformed page snapshot: {}", e))
    }
}

/// Readability-style extractor over a page snapshot
pub struct ContentExtractor {
    containers: Vec<Selector>,
    unwanted: Selector,
    anchors: Selector,
    title: Selector,
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        let containers = CONTAINER_SELECTORS
            .iter()
            .map(|css| parse_selector(css))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            containers,
            unwanted: parse_selector(UNWANTED_SELECTOR)?,
            anchors: parse_selector("a[href]")?,
            title: parse_selector("head > title, title")?,
        })
    }

    /// Snapshot of saved HTML, titled from its `<title>` element
    pub fn snapshot_from_html(&self, url: &str, html: String) -> PageSnapshot {
        let title = Html::parse_document(&html)
            .select(&self.title)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        PageSnapshot {
            url: url.to_string(),
            title,
            html,
        }
    }

    /// Extract text and related links from a snapshot
    pub fn extract(&self, snapshot: &PageSnapshot) -> ExtractedContent {
        let document = Html::parse_document(&snapshot.html);

        let container = self
            .containers
            .iter()
            .find_map(|selector| document.select(selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut raw = String::new();
        self.collect_text(container, &mut raw);

        let content: String = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(MAX_CONTENT_CHARS)
            .collect();

        ExtractedContent {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            content_length: content.chars().count(),
            content,
            related_links: self.related_links(&document, &snapshot.url),
            extracted_at: Utc::now(),
            quality: None,
        }
    }

    /// Text of `element`'s descendants, skipping unwanted subtrees
    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        if !self.unwanted.matches(&child) {
                            self.collect_text(child, out);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn related_links(&self, document: &Html, page_url: &str) -> Vec<RelatedLink> {
        let base = Url::parse(page_url).ok();

        document
            .select(&self.anchors)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let text: String = anchor.text().collect();
                let lower = text.to_lowercase();

                if !RELATED_MARKERS.iter().any(|marker| lower.contains(marker)) {
                    return None;
                }

                let target = match &base {
                    Some(base) => base.join(href).ok()?,
                    None => Url::parse(href).ok()?,
                };
                if !matches!(target.scheme(), "http" | "https") {
                    return None;
                }

                Some(RelatedLink {
                    url: target.to_string(),
                    text: text.trim().to_string(),
                })
            })
            .take(MAX_RELATED_LINKS)
            .collect()
    }
}
