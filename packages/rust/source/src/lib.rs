//! Source API client: login, typed payloads, and paginated extraction.
//!
//! This crate provides:
//! - [`SourceClient`] — Bearer-authenticated, paced HTTP client
//! - [`auth`] — Login token strategies ([`TokenExtractor`])
//! - [`fetch`] — Catalog and per-list price traversals
//! - [`payload`] — Response envelopes and record mapping

pub mod auth;
pub mod client;
pub mod fetch;
pub mod payload;

pub use auth::{FieldPath, TokenExtractor, TokenStrategy};
pub use client::{Fetched, SourceClient, SourceSettings};
pub use fetch::{CatalogFetch, Exhaustion, PageOutcome, PriceFetch, Traversal, paginate};
