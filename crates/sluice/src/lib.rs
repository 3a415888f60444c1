//! Sluice - watch-and-sync pipeline.
//!
//! A run is one pass: take the advisory lock, load dedup state, scan the
//! root for `.RDY` markers, filter out already-processed folders, then
//! either report the eligible items as one JSON array or deliver them to a
//! sink, committing a change token per item only after its delivery
//! succeeds.

pub mod config;
pub mod runner;

pub use config::{Cli, Config, MetaTarget};
pub use runner::{run, RunOutcome, RunSummary};
