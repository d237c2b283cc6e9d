//! Common types module for the courier system.
//!
//! This module defines the core data types and structures used throughout
//! the courier. It provides a centralized location for shared types
//! to ensure consistency across all courier components.

/// Registry trait for self-registering implementations.
pub mod registry;
/// Transaction lifecycle types for broadcast and confirmation tracking.
pub mod transaction;
/// Utility functions for formatting identifiers in logs.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use registry::*;
pub use transaction::*;
pub use utils::truncate_id;
pub use validation::*;
