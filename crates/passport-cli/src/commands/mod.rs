//! CLI command implementations for the passport tool.

pub mod token;
