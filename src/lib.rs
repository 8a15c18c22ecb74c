//! Streaming DDoS detection
//!
//! Ingests a periodically rewritten traffic snapshot, normalizes it into
//! feature records and classifies a sliding window of derived labels with
//! an ensemble of two binary classifiers.

pub mod api;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;
