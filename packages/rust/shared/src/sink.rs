//! Destination capability for the published table.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ColumnFormat, Table};

/// A destination that accepts a finished table under a sheet name.
///
/// `replace` has overwrite semantics: after it returns `Ok`, the sheet holds
/// exactly `table` (header first). Any atomicity guarantee belongs to the
/// implementation.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Clear `sheet` and write `table` from the top-left cell.
    async fn replace(&self, sheet: &str, table: &Table) -> Result<()>;

    /// Apply column-wide display formats to `sheet`.
    async fn apply_formats(&self, sheet: &str, formats: &[ColumnFormat]) -> Result<()>;

    /// Human-readable sink name for tracing.
    fn name(&self) -> &str;
}
