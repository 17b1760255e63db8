//! I/O helpers for genloop commands.

pub mod collaborator;
pub mod config;
pub mod history_store;
pub mod layout;
pub mod materialize;
pub mod process;
pub mod prompt;
pub mod repair;
