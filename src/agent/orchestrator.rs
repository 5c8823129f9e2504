use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::agent::policy::ErrorPolicy;
use crate::agent::queue::{QueueStats, TaskQueue};
use crate::agent::rate_limit::RateLimiter;
use crate::agent::task::{NewTask, Task};
use crate::agent::timer::{RepeatingTimer, TimerHandle};
use crate::browser::driver::PageDriver;
use crate::browser::extract::ExtractedContent;
use crate::browser::host::TabHost;
use crate::browser::quality::QualityValidator;
use crate::browser::tab_pool::{TabPool, TabSlot};
use crate::cli::config::{AgentConfig, AgentSettings};
use crate::error::AgentError;
use crate::report::{AgentReport, ResultReporter};
use crate::utils::metrics::{Metrics, MetricsCollector};

/// Composite agent status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub is_running: bool,
    pub active_tabs: usize,
    pub queue: QueueStats,
}

/// Polls the task queue and drives each task through a background tab
pub struct BrowserAgent {
    settings: AgentSettings,
    queue: Mutex<TaskQueue>,
    driver: PageDriver,
    rate_limiter: RateLimiter,
    validator: QualityValidator,
    reporter: Arc<dyn ResultReporter>,
    report_policy: ErrorPolicy,
    summary_chars: usize,
    metrics: MetricsCollector,
    timer: StdMutex<Option<TimerHandle>>,
}

impl BrowserAgent {
    /// Create a stopped agent
    pub fn new(config: &AgentConfig, host: Arc<dyn TabHost>, reporter: Arc<dyn ResultReporter>) -> Result<Self> {
        config.validate()?;
        let settings = config.agent.clone();

        let pool = Arc::new(TabPool::new(host, settings.max_concurrent_tabs));
        let driver = PageDriver::new(pool, &settings)?;

        let rate_limiter = RateLimiter::new(
            Duration::from_millis(settings.min_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        );

        // Delivery problems are retried as configured, then only logged
        let report_policy = ErrorPolicy::Retry {
            attempts: config.reporting.attempts,
            backoff: Duration::from_millis(config.reporting.retry_backoff_ms),
        };

        Ok(Self {
            settings,
            queue: Mutex::new(TaskQueue::new()),
            driver,
            rate_limiter,
            validator: QualityValidator::new(&config.quality),
            reporter,
            report_policy,
            summary_chars: config.reporting.summary_chars,
            metrics: MetricsCollector::new(),
            timer: StdMutex::new(None),
        })
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start ticking. Starting a running agent does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.lock_timer();
        if timer.is_some() {
            return;
        }

        info!("Starting browser agent (tick every {:?})", self.settings.tick_interval());

        let agent = Arc::downgrade(self);
        *timer = Some(RepeatingTimer::start(self.settings.tick_interval(), move || {
            let agent = agent.clone();
            async move {
                if let Some(agent) = agent.upgrade() {
                    agent.tick().await;
                }
            }
        }));
    }

    /// Stop scheduling ticks. A task already in flight runs to completion.
    pub fn stop(&self) {
        if let Some(timer) = self.lock_timer().take() {
            timer.cancel();
            info!("Stopped browser agent");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer().is_some()
    }

    /// Queue a task and return its id
    pub async fn add_task(&self, task: NewTask) -> String {
        let url = task.url.clone();
        let kind = task.kind;
        let mut queue = self.queue.lock().await;
        let id = queue.add(task);
        info!("Task added: {} - {} (Queue size: {})", kind, url, queue.len());
        id
    }

    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.lock().await.stats()
    }

    pub async fn status(&self) -> AgentStatus {
        AgentStatus {
            is_running: self.is_running(),
            active_tabs: self.driver.pool().active_count(),
            queue: self.queue_stats().await,
        }
    }

    /// Snapshot of one task
    pub async fn task(&self, id: &str) -> Option<Task> {
        self.queue.lock().await.get(id).cloned()
    }

    pub async fn metrics(&self) -> Metrics {
        self.metrics.get_metrics().await
    }

    pub fn tab_pool(&self) -> &Arc<TabPool> {
        self.driver.pool()
    }

    /// Purge finished tasks older than the retention window
    pub async fn cleanup(&self) -> usize {
        self.queue.lock().await.cleanup(self.settings.task_retention())
    }

    /// One timer tick: sweep, then try to process a task
    pub async fn tick(&self) {
        self.metrics.record_tick().await;
        self.cleanup().await;
        self.process_next().await;
    }

    /// Take the next pending task through the whole pipeline.
    ///
    /// Returns the id of the processed task, or `None` when there was no
    /// capacity or nothing to do.
    pub async fn process_next(&self) -> Option<String> {
        let Some(slot) = self.driver.pool().try_reserve() else {
            debug!("Max concurrent tabs reached, waiting...");
            return None;
        };

        let task = {
            let mut queue = self.queue.lock().await;
            let task = queue.next_pending()?.clone();
            queue.mark_processing(&task.id);
            task
        };

        debug!("Processing task {} ({}): {}", task.id, task.kind, task.url);
        let timer = self.metrics.start_timer();

        match self.run_pipeline(&task, slot).await {
            Ok(content) => {
                let (score, valid) = content
                    .quality
                    .as_ref()
                    .map(|q| (q.score, q.is_valid))
                    .unwrap_or((0, false));

                self.queue.lock().await.mark_complete(&task.id, content.clone());
                self.metrics.record_success(timer.end(), score, valid).await;
                info!("Task complete: {} (Quality: {})", task.url, score);

                self.report(&task, &content).await;
            }
            Err(e) => {
                error!("Task failed: {} - {}", task.url, e);
                self.queue.lock().await.mark_failed(&task.id, e.to_string());
                self.metrics.record_failure(timer.end(), e.kind()).await;
            }
        }

        Some(task.id)
    }

    async fn run_pipeline(&self, task: &Task, slot: TabSlot) -> Result<ExtractedContent, AgentError> {
        self.rate_limiter.wait().await;

        let mut content = self.driver.visit(slot, &task.url, &task.id).await?;
        content.quality = Some(self.validator.validate(&content));
        Ok(content)
    }

    async fn report(&self, task: &Task, content: &ExtractedContent) {
        let report = AgentReport::new(task, content, self.summary_chars);

        match self
            .report_policy
            .run("report result", || self.reporter.report(&report))
            .await
        {
            Ok(Some(())) => debug!("Reported task {}", task.id),
            _ => self.metrics.record_report_failure().await,
        }
    }
}

impl Drop for BrowserAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::task::{TaskKind, TaskStatus};
    use crate::browser::host::fake::{FakeHost, FakePage};
    use crate::browser::quality::ISSUE_VERY_SHORT;
    use crate::report::MockResultReporter;
    use tokio::time::sleep;

    const ARTICLE: &str = "<html><body><article><p>Short article body</p>\
        <a href=\"https://example.com/next\">Related reading</a></article></body></html>";

    fn reporter_expecting(times: usize) -> MockResultReporter {
        let mut reporter = MockResultReporter::new();
        reporter.expect_report().times(times).returning(|_| Ok(()));
        reporter
    }

    fn agent(host: Arc<FakeHost>, reporter: MockResultReporter) -> Arc<BrowserAgent> {
        Arc::new(BrowserAgent::new(&AgentConfig::default(), host, Arc::new(reporter)).unwrap())
    }

    fn site(urls: &[&str]) -> Arc<FakeHost> {
        let host = urls.iter().fold(FakeHost::new(), |host, url| {
            host.with_page(url, FakePage::new("Example", ARTICLE))
        });
        Arc::new(host)
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_next_completes_and_reports() {
        let host = site(&["https://example.com/a"]);
        let mut reporter = MockResultReporter::new();
        reporter
            .expect_report()
            .times(1)
            .withf(|r| {
                r.url == "https://example.com/a"
                    && r.task_type == TaskKind::Manual
                    && r.quality_issues.contains(&ISSUE_VERY_SHORT.to_string())
                    && r.related_links.len() == 1
            })
            .returning(|_| Ok(()));
        let agent = agent(host.clone(), reporter);

        let id = agent.add_task(NewTask::new("https://example.com/a", TaskKind::Manual)).await;
        assert_eq!(agent.process_next().await.as_deref(), Some(id.as_str()));

        let task = agent.task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert!(task.completed_at.is_some());
        let quality = task.result.unwrap().quality.unwrap();
        assert_eq!(quality.score, 70);
        assert!(quality.is_valid);

        assert_eq!(agent.status().await.active_tabs, 0);
        assert_eq!(host.open_count(), 0);
        assert_eq!(agent.metrics().await.tasks_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_recorded_and_not_reported() {
        let host = Arc::new(FakeHost::new().fail_open("Tabs cannot be edited right now"));
        let agent = agent(host, reporter_expecting(0));

        let id = agent.add_task(NewTask::new("https://example.com/a", TaskKind::DeepDive)).await;
        agent.process_next().await;

        let task = agent.task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(
            task.error.as_deref(),
            Some("failed to open tab: Tabs cannot be edited right now")
        );
        assert_eq!(agent.metrics().await.failures_by_kind["tab_open"], 1);

        // The loop carries on with the next task
        assert!(agent.process_next().await.is_none());
        assert!(agent.tab_pool().can_open_new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporting_failure_keeps_task_complete() {
        let host = site(&["https://example.com/a"]);
        let mut reporter = MockResultReporter::new();
        reporter.expect_report().times(1).returning(|_| {
            Err(AgentError::Reporting { message: "connection refused".to_string() })
        });
        let agent = agent(host, reporter);

        let id = agent.add_task(NewTask::new("https://example.com/a", TaskKind::Manual)).await;
        agent.process_next().await;

        assert_eq!(agent.task(&id).await.unwrap().status, TaskStatus::Complete);
        assert_eq!(agent.metrics().await.reports_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_capacity_skips_tick() {
        let host = site(&["https://example.com/a"]);
        let agent = agent(host.clone(), reporter_expecting(0));
        let id = agent.add_task(NewTask::new("https://example.com/a", TaskKind::Manual)).await;

        let _a = agent.tab_pool().try_reserve().unwrap();
        let _b = agent.tab_pool().try_reserve().unwrap();

        assert!(agent.process_next().await.is_none());
        assert_eq!(agent.task(&id).await.unwrap().status, TaskStatus::Pending);
        assert!(host.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_highest_priority_first() {
        let urls = ["https://example.com/1", "https://example.com/5", "https://example.com/3"];
        let host = site(&urls);
        let agent = agent(host.clone(), reporter_expecting(3));

        for (url, priority) in urls.iter().zip([1, 5, 3]) {
            agent
                .add_task(NewTask::new(*url, TaskKind::Manual).with_priority(priority))
                .await;
        }
        while agent.process_next().await.is_some() {}

        assert_eq!(
            host.opened(),
            vec!["https://example.com/5", "https://example.com/3", "https://example.com/1"]
        );
        assert_eq!(agent.queue_stats().await.complete, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_halts_ticks() {
        let host = site(&["https://example.com/a", "https://example.com/b"]);
        let agent = agent(host.clone(), reporter_expecting(1));

        agent.start();
        agent.start();
        assert!(agent.is_running());

        // One immediate tick, then one per 5 s period; a second timer would double this
        sleep(Duration::from_millis(3 * 5000 + 100)).await;
        assert_eq!(agent.metrics().await.ticks, 4);

        agent.add_task(NewTask::new("https://example.com/a", TaskKind::Manual)).await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(agent.queue_stats().await.complete, 1);

        agent.stop();
        agent.stop();
        assert!(!agent.is_running());
        let ticks = agent.metrics().await.ticks;

        let id = agent.add_task(NewTask::new("https://example.com/b", TaskKind::Manual)).await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(agent.task(&id).await.unwrap().status, TaskStatus::Pending);
        assert_eq!(agent.metrics().await.ticks, ticks);
        assert!(!agent.status().await.is_running);
    }

    #[test]
    fn test_rejects_unbounded_retention() {
        let mut config = AgentConfig::default();
        config.agent.task_retention_secs = 10_000_000_000_000_000;
        let result = BrowserAgent::new(&config, site(&[]), Arc::new(MockResultReporter::new()));
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_ticks_respect_tab_cap() {
        let urls: Vec<String> = (0..6).map(|i| format!("https://example.com/{}", i)).collect();
        let host = urls.iter().fold(FakeHost::new(), |host, url| {
            let mut page = FakePage::new("Example", ARTICLE);
            page.loading_polls = 40;
            host.with_page(url, page)
        });
        let host = Arc::new(host);

        let mut config = AgentConfig::default();
        config.agent.tick_interval_ms = 200;
        config.agent.min_delay_ms = 100;
        config.agent.max_delay_ms = 300;
        let agent = Arc::new(
            BrowserAgent::new(&config, host.clone(), Arc::new(reporter_expecting(6))).unwrap(),
        );

        for url in &urls {
            agent.add_task(NewTask::new(url.clone(), TaskKind::PreValidate)).await;
        }

        agent.start();
        sleep(Duration::from_secs(600)).await;
        agent.stop();

        assert_eq!(agent.queue_stats().await.complete, 6);
        assert_eq!(host.max_open_seen(), 2);
        assert_eq!(agent.status().await.active_tabs, 0);
    }
}
