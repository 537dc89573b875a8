//! # Configuration
//!
//! Server and Gemini configuration, loaded from defaults, an optional YAML or
//! JSON file, and environment variables.

pub mod gemini;
pub mod server;
