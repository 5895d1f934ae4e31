//! Filesystem helpers for backup artifacts.

pub mod checksum;
