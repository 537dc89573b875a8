//! Shell completion scripts for the CLI.

use clap::CommandFactory;
use clap_complete::{generate, shells::Shell};
use std::io::Write;

pub const BIN_NAME: &str = "foodfinder";

/// Writes the completion script for `shell` to `out`.
pub fn generate_completion(shell: Shell, out: &mut dyn Write) {
    let mut app = crate::Cli::command();
    generate(shell, &mut app, BIN_NAME, out);
}
