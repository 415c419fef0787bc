//! Capability interfaces for the external services the pipeline drives.

pub mod completion;
pub mod fetcher;
pub mod searcher;
