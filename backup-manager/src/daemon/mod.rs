//! Process lifecycle helpers for the CLI.

pub mod shutdown;
