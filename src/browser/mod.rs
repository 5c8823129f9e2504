pub mod behavior;
pub mod driver;
pub mod extract;
pub mod host;
pub mod quality;
pub mod script;
pub mod tab_pool;
pub mod webdriver;

// Re-export common types
pub use behavior::BehaviorSimulator;
pub use driver::PageDriver;
pub use extract::{ContentExtractor, ExtractedContent, PageSnapshot, RelatedLink};
pub use host::{HostError, PageScript, TabHost, TabId, TabStatus};
pub use quality::{QualityValidator, QualityVerdict};
pub use tab_pool::{TabPool, TabSlot};
pub use webdriver::WebDriverHost;
