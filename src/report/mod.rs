pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::task::{Task, TaskKind};
use crate::browser::extract::{ExtractedContent, RelatedLink};
use crate::error::AgentError;

pub use http::HttpReporter;

/// Payload sent for every completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    pub task_id: String,
    pub task_type: TaskKind,
    pub url: String,
    pub title: String,
    pub content_summary: String,
    pub content_length: usize,
    pub quality_score: u32,
    pub quality_issues: Vec<String>,
    pub related_links: Vec<RelatedLink>,
    pub metadata: Map<String, Value>,
}

impl AgentReport {
    /// Build the payload, keeping at most `summary_chars` characters of content
    pub fn new(task: &Task, content: &ExtractedContent, summary_chars: usize) -> Self {
        let (quality_score, quality_issues) = match &content.quality {
            Some(quality) => (quality.score, quality.issues.clone()),
            None => (0, Vec::new()),
        };

        Self {
            task_id: task.id.clone(),
            task_type: task.kind,
            url: content.url.clone(),
            title: content.title.clone(),
            content_summary: content.content.chars().take(summary_chars).collect(),
            content_length: content.content_length,
            quality_score,
            quality_issues,
            related_links: content.related_links.clone(),
            metadata: task.metadata.clone(),
        }
    }
}

/// Consumer of completed task results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, report: &AgentReport) -> Result<(), AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::task::NewTask;
    use crate::browser::quality::QualityVerdict;
    use chrono::Utc;

    #[test]
    fn test_report_payload() {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), Value::from("Watched"));
        let task = Task::from_new(
            "task_1".to_string(),
            NewTask::new("https://example.com", TaskKind::WatchCheck)
                .with_priority(5)
                .with_metadata(metadata),
            Utc::now(),
        );
        let content = ExtractedContent {
            url: "https://example.com/final".to_string(),
            title: "Final".to_string(),
            content: "é".repeat(6000),
            content_length: 6000,
            related_links: vec![RelatedLink {
                url: "https://example.com/next".to_string(),
                text: "Read more".to_string(),
            }],
            extracted_at: Utc::now(),
            quality: Some(QualityVerdict {
                score: 100,
                issues: vec![],
                is_valid: true,
            }),
        };

        let report = AgentReport::new(&task, &content, 5000);
        assert_eq!(report.content_summary.chars().count(), 5000);
        assert_eq!(report.content_length, 6000);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["taskId"], "task_1");
        assert_eq!(json["taskType"], "watch_check");
        assert_eq!(json["url"], "https://example.com/final");
        assert_eq!(json["qualityScore"], 100);
        assert_eq!(json["qualityIssues"], serde_json::json!([]));
        assert_eq!(json["relatedLinks"][0]["url"], "https://example.com/next");
        assert_eq!(json["metadata"]["title"], "Watched");
    }
}
