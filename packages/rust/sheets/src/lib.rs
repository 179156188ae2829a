//! Google Sheets destination for the published table.
//!
//! [`SheetsSink`] implements [`caddis_shared::TableSink`] over the Sheets v4
//! REST API using a caller-supplied OAuth access token.

pub mod api;
pub mod sink;

pub use sink::{SheetsSettings, SheetsSink};
