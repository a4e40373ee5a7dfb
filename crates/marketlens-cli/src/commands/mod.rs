//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Analysis and knowledge base generation, shared setup (config, prompts)
//! - `backend` - Backend connectivity check
//! - `prompts` - Prompt library management commands
//! - `query` - Question answering, single-shot and interactive
//! - `report` - Executive report generation

pub mod backend;
pub mod core;
pub mod prompts;
pub mod query;
pub mod report;

// Re-export command functions for main.rs
pub use backend::*;
pub use core::*;
pub use prompts::*;
pub use query::*;
pub use report::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
