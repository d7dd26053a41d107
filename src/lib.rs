//! Tracelens - trace chains and time clusters from malformed log exports
//!
//! Ingests semi-structured, often malformed JSON log records exported from a
//! search platform and derives two views: per-request trace chains rendered
//! as linear node/edge graphs, and time-proximity clusters of otherwise
//! unrelated events.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod graph;
pub mod query;
pub mod record;
pub mod repair;
pub mod service;
pub mod trace;

pub use error::{Result, TracelensError};
