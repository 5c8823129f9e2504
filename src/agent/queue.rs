use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::task::{NewTask, Task, TaskStatus};
use crate::browser::extract::ExtractedContent;

/// Per-status task counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
    pub total: usize,
}

/// In-memory priority queue of automation tasks.
///
/// Tasks stay in the queue after they finish so their outcome can be
/// queried; [`TaskQueue::cleanup`] purges finished tasks once they age out.
#[derive(Debug, Default)]
pub struct TaskQueue {
    /// Tasks ordered by descending priority, insertion order within a priority
    tasks: Vec<Task>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task and return its id
    pub fn add(&mut self, new: NewTask) -> String {
        let id = format!("task_{}", Uuid::new_v4().simple());
        let task = Task::from_new(id.clone(), new, Utc::now());

        // Goes in front of the first task with strictly lower priority
        let position = self
            .tasks
            .iter()
            .position(|t| t.priority < task.priority)
            .unwrap_or(self.tasks.len());

        self.tasks.insert(position, task);
        id
    }

    /// First pending task in queue order, without changing its state
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Pending)
    }

    /// Look up a task by id
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Move a pending task to processing
    pub fn mark_processing(&mut self, id: &str) {
        if let Some(task) = self.get_mut(id) {
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::Processing;
            } else {
                warn!("Ignoring processing transition for task {} in state {:?}", id, task.status);
            }
        }
    }

    /// Processing task with this id; other states are logged and skipped
    fn processing_mut(&mut self, id: &str, outcome: TaskStatus) -> Option<&mut Task> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Processing {
            warn!("Ignoring {:?} transition for task {} in state {:?}", outcome, id, task.status);
            return None;
        }
        Some(task)
    }

    /// Record a successful outcome for a processing task
    pub fn mark_complete(&mut self, id: &str, result: ExtractedContent) {
        if let Some(task) = self.processing_mut(id, TaskStatus::Complete) {
            task.status = TaskStatus::Complete;
            task.result = Some(result);
            task.completed_at = Some(Utc::now());
        }
    }

    /// Record a failure for a processing task
    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) {
        if let Some(task) = self.processing_mut(id, TaskStatus::Failed) {
            task.status = TaskStatus::Failed;
            task.error = Some(error.into());
            task.completed_at = Some(Utc::now());
        }
    }

    /// Count tasks per status
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.tasks.len(),
            ..Default::default()
        };

        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Complete => stats.complete += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }

        stats
    }

    /// Purge finished tasks older than `max_age`. Returns how many were removed.
    pub fn cleanup(&mut self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.cleanup_before(cutoff)
    }

    fn cleanup_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();

        self.tasks.retain(|t| match (t.status.is_terminal(), t.completed_at) {
            (false, _) => true,
            (true, Some(completed_at)) => completed_at > cutoff,
            (true, None) => false,
        });

        let removed = before - self.tasks.len();
        if removed > 0 {
            debug!("Cleaned up {} finished tasks", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::task::TaskKind;
    use std::collections::HashSet;

    fn task(url: &str, priority: i32) -> NewTask {
        NewTask::new(url, TaskKind::Manual).with_priority(priority)
    }

    fn content(url: &str) -> ExtractedContent {
        ExtractedContent {
            url: url.to_string(),
            title: "Title".to_string(),
            content: String::new(),
            content_length: 0,
            related_links: vec![],
            extracted_at: Utc::now(),
            quality: None,
        }
    }

    #[test]
    fn test_priority_order() {
        let mut queue = TaskQueue::new();
        let low = queue.add(task("https://example.com/1", 1));
        let high = queue.add(task("https://example.com/5", 5));
        let mid = queue.add(task("https://example.com/3", 3));

        let next = queue.next_pending().unwrap().id.clone();
        assert_eq!(next, high);
        queue.mark_processing(&next);
        queue.mark_complete(&next, content("https://example.com/5"));

        let next = queue.next_pending().unwrap().id.clone();
        assert_eq!(next, mid);
        queue.mark_processing(&next);
        queue.mark_failed(&next, "boom");

        let next = queue.next_pending().unwrap().id.clone();
        assert_eq!(next, low);
        queue.mark_processing(&next);
        queue.mark_complete(&next, content("https://example.com/1"));

        assert!(queue.next_pending().is_none());
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let mut queue = TaskQueue::new();
        let first = queue.add(task("https://example.com/a", 2));
        let second = queue.add(task("https://example.com/b", 2));
        let urgent = queue.add(task("https://example.com/c", 9));

        assert_eq!(queue.next_pending().unwrap().id, urgent);
        queue.mark_processing(&urgent);
        assert_eq!(queue.next_pending().unwrap().id, first);
        queue.mark_processing(&first);
        assert_eq!(queue.next_pending().unwrap().id, second);
    }

    #[test]
    fn test_next_pending_does_not_dequeue() {
        let mut queue = TaskQueue::new();
        let id = queue.add(task("https://example.com", 0));

        assert_eq!(queue.next_pending().unwrap().id, id);
        assert_eq!(queue.next_pending().unwrap().id, id);
        assert_eq!(queue.stats().pending, 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut queue = TaskQueue::new();
        let ids: HashSet<String> = (0..200)
            .map(|i| queue.add(task(&format!("https://example.com/{}", i), i % 7)))
            .collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(queue.stats().total, 200);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut queue = TaskQueue::new();
        queue.mark_processing("missing");
        queue.mark_complete("missing", content("https://example.com"));
        queue.mark_failed("missing", "nope");
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[test]
    fn test_status_never_moves_backwards() {
        let mut queue = TaskQueue::new();
        let id = queue.add(task("https://example.com", 0));
        queue.mark_processing(&id);
        queue.mark_failed(&id, "timeout");

        queue.mark_processing(&id);
        queue.mark_complete(&id, content("https://example.com"));

        let task = queue.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("timeout"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_pending_task_cannot_finish_without_processing() {
        let mut queue = TaskQueue::new();
        let done = queue.add(task("https://example.com/a", 0));
        let failed = queue.add(task("https://example.com/b", 0));

        queue.mark_complete(&done, content("https://example.com/a"));
        queue.mark_failed(&failed, "boom");

        assert_eq!(queue.stats().pending, 2);
        assert!(queue.get(&done).unwrap().completed_at.is_none());
        assert!(queue.get(&failed).unwrap().error.is_none());
    }

    #[test]
    fn test_cleanup_with_huge_retention_keeps_everything() {
        let mut queue = TaskQueue::new();
        let id = queue.add(task("https://example.com", 0));
        queue.mark_processing(&id);
        queue.mark_complete(&id, content("https://example.com"));

        assert_eq!(queue.cleanup(Duration::days(365 * 300_000)), 0);
        assert!(queue.get(&id).is_some());
    }

    #[test]
    fn test_stats() {
        let mut queue = TaskQueue::new();
        let a = queue.add(task("https://example.com/a", 0));
        let b = queue.add(task("https://example.com/b", 0));
        let c = queue.add(task("https://example.com/c", 0));
        queue.add(task("https://example.com/d", 0));

        queue.mark_processing(&a);
        queue.mark_processing(&b);
        queue.mark_complete(&b, content("https://example.com/b"));
        queue.mark_processing(&c);
        queue.mark_failed(&c, "closed");

        assert_eq!(
            queue.stats(),
            QueueStats { pending: 1, processing: 1, complete: 1, failed: 1, total: 4 }
        );
    }

    #[test]
    fn test_cleanup_purges_only_old_finished_tasks() {
        let mut queue = TaskQueue::new();
        let old_done = queue.add(task("https://example.com/old-done", 0));
        let fresh_done = queue.add(task("https://example.com/fresh-done", 0));
        let old_pending = queue.add(task("https://example.com/old-pending", 0));
        let old_processing = queue.add(task("https://example.com/old-processing", 0));

        queue.mark_processing(&old_done);
        queue.mark_complete(&old_done, content("https://example.com/old-done"));
        queue.mark_processing(&fresh_done);
        queue.mark_failed(&fresh_done, "boom");
        queue.mark_processing(&old_processing);

        let two_hours_ago = Utc::now() - Duration::hours(2);
        for t in queue.tasks.iter_mut() {
            t.added_at = two_hours_ago;
            if t.id == old_done {
                t.completed_at = Some(two_hours_ago);
            }
        }

        let removed = queue.cleanup(Duration::hours(1));

        assert_eq!(removed, 1);
        assert!(queue.get(&old_done).is_none());
        assert!(queue.get(&fresh_done).is_some());
        assert!(queue.get(&old_pending).is_some());
        assert!(queue.get(&old_processing).is_some());
        assert_eq!(queue.stats().total, 3);
    }
}
