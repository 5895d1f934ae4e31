//! Persistent metadata catalog.

pub mod metadata;

pub use metadata::{Listing, MetadataStore};
