//! JSON control messages accepted by a running agent.
//!
//! ```json
//! {"type": "AGENT_CRAWL", "url": "https://example.com", "taskType": "deep_dive", "priority": 3}
//! {"type": "WATCH_PAGE", "url": "https://example.com", "title": "Example"}
//! {"type": "AGENT_STATUS"}
//! {"type": "AGENT_CONTROL", "action": "stop"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::agent::orchestrator::{AgentStatus, BrowserAgent};
use crate::agent::task::{NewTask, TaskKind};

/// Priority given to watch requests
pub const WATCH_PRIORITY: i32 = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    #[serde(rename_all = "camelCase")]
    AgentCrawl {
        url: String,
        #[serde(default)]
        task_type: Option<TaskKind>,
        #[serde(default)]
        priority: Option<i32>,
        #[serde(default)]
        metadata: Option<Map<String, Value>>,
    },
    WatchPage {
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    AgentStatus,
    AgentControl {
        action: ControlAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    #[serde(rename_all = "camelCase")]
    Queued { success: bool, task_id: String },
    Status(AgentStatus),
    Control { success: bool, status: &'static str },
    Error { success: bool, error: String },
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error {
            success: false,
            error: message.into(),
        }
    }
}

/// Apply a control message to the agent
pub async fn handle(agent: &Arc<BrowserAgent>, message: ControlMessage) -> ControlResponse {
    match message {
        ControlMessage::AgentCrawl { url, task_type, priority, metadata } => {
            let task = NewTask::new(url, task_type.unwrap_or_default())
                .with_priority(priority.unwrap_or(0))
                .with_metadata(metadata.unwrap_or_default());
            let task_id = agent.add_task(task).await;
            ControlResponse::Queued { success: true, task_id }
        }
        ControlMessage::WatchPage { url: Some(url), title } => {
            let mut metadata = Map::new();
            metadata.insert("title".to_string(), title.map(Value::from).unwrap_or(Value::Null));
            metadata.insert("isInitialWatch".to_string(), Value::from(true));

            let task = NewTask::new(url.clone(), TaskKind::WatchCheck)
                .with_priority(WATCH_PRIORITY)
                .with_metadata(metadata);
            let task_id = agent.add_task(task).await;
            info!("Added watch task: {}", url);
            ControlResponse::Queued { success: true, task_id }
        }
        ControlMessage::WatchPage { url: None, .. } => ControlResponse::error("No URL provided"),
        ControlMessage::AgentStatus => ControlResponse::Status(agent.status().await),
        ControlMessage::AgentControl { action: ControlAction::Start } => {
            agent.start();
            ControlResponse::Control { success: true, status: "started" }
        }
        ControlMessage::AgentControl { action: ControlAction::Stop } => {
            agent.stop();
            ControlResponse::Control { success: true, status: "stopped" }
        }
    }
}

/// Parse one JSON line and apply it
pub async fn handle_line(agent: &Arc<BrowserAgent>, line: &str) -> ControlResponse {
    match serde_json::from_str::<ControlMessage>(line) {
        Ok(message) => handle(agent, message).await,
        Err(e) => ControlResponse::error(format!("invalid control message: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::task::TaskStatus;
    use crate::browser::host::fake::FakeHost;
    use crate::cli::config::AgentConfig;
    use crate::report::MockResultReporter;
    use serde_json::json;

    fn agent() -> Arc<BrowserAgent> {
        Arc::new(
            BrowserAgent::new(
                &AgentConfig::default(),
                Arc::new(FakeHost::new()),
                Arc::new(MockResultReporter::new()),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_parse_messages() {
        let message: ControlMessage = serde_json::from_value(json!({
            "type": "AGENT_CRAWL",
            "url": "https://example.com",
            "taskType": "deep_dive",
            "priority": 3,
            "metadata": { "source": "cli" }
        }))
        .unwrap();
        assert!(matches!(
            message,
            ControlMessage::AgentCrawl { task_type: Some(TaskKind::DeepDive), priority: Some(3), .. }
        ));

        let message: ControlMessage =
            serde_json::from_value(json!({ "type": "AGENT_CONTROL", "action": "start" })).unwrap();
        assert_eq!(message, ControlMessage::AgentControl { action: ControlAction::Start });
    }

    #[tokio::test]
    async fn test_crawl_defaults() {
        let agent = agent();
        let response = handle_line(&agent, r#"{"type":"AGENT_CRAWL","url":"https://example.com"}"#).await;

        let ControlResponse::Queued { success: true, task_id } = response else {
            panic!("unexpected response: {:?}", response);
        };
        let task = agent.task(&task_id).await.unwrap();
        assert_eq!(task.kind, TaskKind::Manual);
        assert_eq!(task.priority, 0);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_watch_page() {
        let agent = agent();
        let response = handle(
            &agent,
            ControlMessage::WatchPage {
                url: Some("https://example.com/watch".to_string()),
                title: Some("Watched".to_string()),
            },
        )
        .await;

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        let task = agent.task(json["taskId"].as_str().unwrap()).await.unwrap();
        assert_eq!(task.kind, TaskKind::WatchCheck);
        assert_eq!(task.priority, WATCH_PRIORITY);
        assert_eq!(task.metadata["title"], "Watched");
        assert_eq!(task.metadata["isInitialWatch"], true);

        let response = handle(&agent, ControlMessage::WatchPage { url: None, title: None }).await;
        assert_eq!(response, ControlResponse::error("No URL provided"));
    }

    #[tokio::test]
    async fn test_status_and_control() {
        let agent = agent();

        let json = serde_json::to_value(handle_line(&agent, r#"{"type":"AGENT_STATUS"}"#).await).unwrap();
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["activeTabs"], 0);
        assert_eq!(json["queue"]["total"], 0);

        let response = handle(&agent, ControlMessage::AgentControl { action: ControlAction::Start }).await;
        assert_eq!(response, ControlResponse::Control { success: true, status: "started" });
        assert!(agent.is_running());

        let response = handle(&agent, ControlMessage::AgentControl { action: ControlAction::Stop }).await;
        assert_eq!(response, ControlResponse::Control { success: true, status: "stopped" });
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_invalid_line() {
        let agent = agent();
        let response = handle_line(&agent, r#"{"type":"AGENT_SELF_DESTRUCT"}"#).await;
        assert!(matches!(response, ControlResponse::Error { success: false, .. }));
    }
}
