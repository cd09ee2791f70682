//! CLI commands.

pub mod clean;
pub mod list;
pub mod run;
