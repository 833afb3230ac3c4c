//! Shared data model, reply parsing, and configuration for stagecraft.

pub mod config;
pub mod parsing;
pub mod types;
