pub mod splitter;

// Re-export the main splitting types for external use
pub use splitter::{DEFAULT_SEPARATORS, SplitConfig, TextSplitter};
