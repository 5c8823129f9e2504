pub mod settings;

// Re-export common types
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};
