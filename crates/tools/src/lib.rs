//! Built-in tool implementations for TentaCool.
//!
//! The matchmaker persona gets exactly one tool: `fetch_profiles`, which
//! reads the public attendee directory from the profile store. Other
//! personas run with an empty registry.

pub mod fetch_profiles;

pub use fetch_profiles::FetchProfilesTool;

use std::sync::Arc;
use tentacool_core::tool::ToolRegistry;
use tentacool_store::ProfileStore;

/// Registry for the matchmaker persona: directory access only.
pub fn matchmaker_registry(store: Arc<dyn ProfileStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FetchProfilesTool::new(store)));
    registry
}
