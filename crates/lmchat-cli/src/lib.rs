// Library interface for lmchat-cli so integration tests can reach the
// command handlers. main.rs declares the same file as a module, hence the
// path attribute.

#[path = "commands.rs"]
pub mod commands;

pub use commands::{run_command, Command};
