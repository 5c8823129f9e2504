pub mod control;
pub mod orchestrator;
pub mod policy;
pub mod queue;
pub mod rate_limit;
pub mod task;
pub mod timer;

// Re-export common types
pub use control::{ControlMessage, ControlResponse};
pub use orchestrator::{AgentStatus, BrowserAgent};
pub use policy::ErrorPolicy;
pub use queue::{QueueStats, TaskQueue};
pub use rate_limit::RateLimiter;
pub use task::{NewTask, Task, TaskKind, TaskStatus};
