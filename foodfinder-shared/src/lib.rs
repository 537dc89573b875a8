#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Shared building blocks for the Food Finder chat gateway: configuration,
//! the chat wire contract, and the Gemini wire protocol.

pub mod config;
pub mod gemini;
pub mod models;
