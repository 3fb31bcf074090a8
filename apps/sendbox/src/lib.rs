//! # Sendbox Library
//!
//! This library exposes the sendbox modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod grader;
pub mod pipeline;

// Re-export sendbox_core for convenience
pub use sendbox_core;
