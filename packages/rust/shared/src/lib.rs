//! Shared types, error model, and configuration for caddis-sync.
//!
//! This crate is the foundation depended on by all other caddis-sync crates.
//! It provides:
//! - [`SyncError`] — the unified error type
//! - Domain types ([`Article`], [`PriceEntry`], [`PriceListId`], [`Table`])
//! - The [`TableSink`] destination capability
//! - Tax-inclusive price derivation ([`pricing`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod pricing;
pub mod sink;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, SheetsConfig, SourceConfig, SyncConfig, SyncPoliciesConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SyncError};
pub use pricing::compute_inclusive_price;
pub use sink::TableSink;
pub use types::{
    ATTRIBUTE_HEADERS, Article, COLUMN_COUNT, Cell, ColumnFormat, FIRST_PRICE_COLUMN,
    NumberFormat, PRICE_LISTS, PriceEntry, PriceList, PriceListId, TAX_DISPLAY_LIST, Table,
    all_price_list_ids, published_formats,
};
