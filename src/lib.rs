//! Background-tab browsing agent.
//!
//! Tasks are queued by priority, visited one background tab at a time under a
//! concurrency cap and a randomized rate limit, scrolled, reduced to readable
//! text, scored for quality and reported to an ingestion backend.

pub mod agent;
pub mod browser;
pub mod cli;
pub mod error;
pub mod report;
pub mod storage;
pub mod utils;

pub use agent::{BrowserAgent, NewTask, TaskKind};
pub use error::AgentError;
