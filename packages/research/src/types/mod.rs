//! Data types flowing through the research pipeline.

pub mod config;
pub mod fact;
pub mod page;
pub mod query;
pub mod report;
pub mod summary;
