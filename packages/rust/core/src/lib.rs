//! Reconciliation and run orchestration for caddis-sync.
//!
//! This crate joins extracted articles and prices into the published table
//! ([`reconcile`]) and drives a full sync run ([`pipeline`]).

pub mod pipeline;
pub mod reconcile;

pub use pipeline::{
    Phase, Pipeline, ProgressReporter, RunOptions, RunReport, SilentProgress, run_sync,
};
pub use reconcile::{combine, tax_percent_display};
