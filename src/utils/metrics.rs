use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Agent metrics collector
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// In-memory metrics store
    metrics: Arc<Mutex<Metrics>>,
}

/// Metrics data structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Start time of the metrics collection
    pub start_time: DateTime<Utc>,

    /// Timer ticks handled
    pub ticks: u64,

    /// Tasks that produced content
    pub tasks_completed: usize,

    /// Tasks that ended in an error
    pub tasks_failed: usize,

    /// Failures by error kind
    pub failures_by_kind: HashMap<String, usize>,

    /// Results that could not be delivered
    pub reports_failed: usize,

    /// Pipelines timed so far
    pub pipeline_runs: u64,

    /// Sum of pipeline durations in milliseconds
    pub pipeline_ms_total: u64,

    /// Sum of quality scores of completed tasks
    pub quality_score_total: u64,

    /// Completed tasks judged usable
    pub valid_pages: usize,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            ticks: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            failures_by_kind: HashMap::new(),
            reports_failed: 0,
            pipeline_runs: 0,
            pipeline_ms_total: 0,
            quality_score_total: 0,
            valid_pages: 0,
        }
    }
}

impl Metrics {
    /// Mean quality score of completed tasks
    pub fn mean_quality_score(&self) -> Option<f64> {
        if self.tasks_completed == 0 {
            None
        } else {
            Some(self.quality_score_total as f64 / self.tasks_completed as f64)
        }
    }

    /// Mean pipeline duration in milliseconds
    pub fn mean_pipeline_ms(&self) -> Option<f64> {
        if self.pipeline_runs == 0 {
            None
        } else {
            Some(self.pipeline_ms_total as f64 / self.pipeline_runs as f64)
        }
    }
}

impl Metrics {
    fn record_duration(&mut self, duration_ms: u64) {
        self.pipeline_runs += 1;
        self.pipeline_ms_total = self.pipeline_ms_total.saturating_add(duration_ms);
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(Metrics::default())),
        }
    }

    /// Record a completed task
    pub async fn record_success(&self, duration_ms: u64, quality_score: u32, valid: bool) {
        let mut metrics = self.metrics.lock().await;
        metrics.tasks_completed += 1;
        metrics.record_duration(duration_ms);
        metrics.quality_score_total += quality_score as u64;
        if valid {
            metrics.valid_pages += 1;
        }
    }

    /// Record a failed task
    pub async fn record_failure(&self, duration_ms: u64, kind: &str) {
        let mut metrics = self.metrics.lock().await;
        metrics.tasks_failed += 1;
        metrics.record_duration(duration_ms);
        *metrics.failures_by_kind.entry(kind.to_string()).or_default() += 1;
    }

    pub async fn record_tick(&self) {
        self.metrics.lock().await.ticks += 1;
    }

    /// Record a result that could not be delivered
    pub async fn record_report_failure(&self) {
        self.metrics.lock().await.reports_failed += 1;
    }

    /// Start timing a pipeline
    pub fn start_timer(&self) -> PipelineTimer {
        PipelineTimer {
            start: Instant::now(),
        }
    }

    /// Get all metrics
    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.lock().await.clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer for measuring pipeline durations
pub struct PipelineTimer {
    /// Start time of the pipeline
    start: Instant,
}

impl PipelineTimer {
    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
