//! Job Tracker: turns job-application emails into tracked application records.

pub mod applications;
pub mod config;
pub mod error;
pub mod llm;
pub mod mime;
pub mod pipeline;
pub mod store;
