//! Core domain types for the catalog/price sync.

use std::fmt;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Price lists
// ---------------------------------------------------------------------------

/// Identifier of a commercial price list.
///
/// Only ids present in [`PRICE_LISTS`] can be constructed, so every
/// `PriceListId` in circulation maps to a published column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceListId(u16);

impl PriceListId {
    /// Look up a raw list id in the catalog.
    pub fn lookup(raw: u32) -> Option<Self> {
        PRICE_LISTS
            .iter()
            .map(|list| list.id)
            .find(|id| u32::from(id.0) == raw)
    }

    /// The numeric id as sent to the source API.
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Published column label for this list.
    pub fn label(self) -> &'static str {
        PRICE_LISTS
            .iter()
            .find(|list| list.id == self)
            .map(|list| list.label)
            .unwrap_or_default()
    }
}

impl fmt::Display for PriceListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A price list and its published column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceList {
    pub id: PriceListId,
    pub label: &'static str,
}

const fn list(id: u16, label: &'static str) -> PriceList {
    PriceList {
        id: PriceListId(id),
        label,
    }
}

/// The fixed set of recognized price lists, in published column order.
pub const PRICE_LISTS: [PriceList; 24] = [
    list(1, "Minorista Ars"),
    list(2, "Dealer Ars"),
    list(3, "Dealer 1 Ars"),
    list(5, "Dealer 30d Ars"),
    list(7, "Nautica Dealer Usd"),
    list(8, "Dealer 60d Ars"),
    list(9, "Mino Ml Premium Ars"),
    list(10, "Sub Distribuidor Usd"),
    list(11, "Dealer 55mkup Ars"),
    list(12, "Dealer 50mkup Ars"),
    list(13, "Anterior Mino Ars"),
    list(14, "Mixta Ars"),
    list(15, "Grouping 70mkup Ars"),
    list(16, "Dealer Cencosud Ars"),
    list(17, "Nautica Dealer 1 Usd"),
    list(18, "Nautica Dealer Ars"),
    list(19, "Nautica Dealer 1 Ars"),
    list(20, "Fob Standard Usd"),
    list(21, "Dealer Golf Ars"),
    list(22, "Gpsmundo Srl"),
    list(23, "Dealer Meli Ars"),
    list(24, "Dealer 5g Ars"),
    list(25, "Fob Supplier Llc"),
    list(33, "Dealer Diggit Ars"),
];

/// The list whose tax rate feeds the `IVA` display column.
pub const TAX_DISPLAY_LIST: PriceListId = PriceListId(1);

/// All catalog ids in published order.
pub fn all_price_list_ids() -> Vec<PriceListId> {
    PRICE_LISTS.iter().map(|list| list.id).collect()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An active catalog article, as mapped from one catalog page record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Article {
    /// Upstream identifier, kept for provenance only.
    pub id: Option<String>,
    /// Product code; the join key. Never empty.
    pub sku: String,
    pub nombre: String,
    pub tipo: String,
    pub marca: String,
    pub grupo: String,
}

/// One tax-inclusive price for a (sku, list) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEntry {
    pub sku: String,
    pub list_id: PriceListId,
    /// Fractional tax rate, e.g. `0.105`.
    pub tax_rate: Decimal,
    /// Tax-inclusive unit price, rounded to 2 decimals at ingestion.
    pub unit_price: Decimal,
}

// ---------------------------------------------------------------------------
// Output table
// ---------------------------------------------------------------------------

/// Leading attribute columns of the published table.
pub const ATTRIBUTE_HEADERS: [&str; 6] = ["Código", "Tipo", "Artículo", "Grupo", "Marca", "IVA"];

/// Total column count: attributes plus one column per price list.
pub const COLUMN_COUNT: usize = ATTRIBUTE_HEADERS.len() + PRICE_LISTS.len();

/// Index of the first price-list column.
pub const FIRST_PRICE_COLUMN: usize = ATTRIBUTE_HEADERS.len();

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(Decimal),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// A rectangular table: one header row plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build the published header row.
    pub fn published_header() -> Vec<String> {
        ATTRIBUTE_HEADERS
            .iter()
            .copied()
            .chain(PRICE_LISTS.iter().map(|list| list.label))
            .map(String::from)
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether every row has as many cells as the header.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.header.len())
    }

    /// SHA-256 over the table contents, hex encoded.
    ///
    /// Numbers are hashed in normalized form, so `110.5` and `110.50`
    /// fingerprint identically.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.header {
            hasher.update(b"h");
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
        }
        for row in &self.rows {
            hasher.update([0x1e]);
            for cell in row {
                match cell {
                    Cell::Text(s) => {
                        hasher.update(b"t");
                        hasher.update(s.as_bytes());
                    }
                    Cell::Number(d) => {
                        hasher.update(b"n");
                        hasher.update(d.normalize().to_string().as_bytes());
                    }
                    Cell::Empty => hasher.update(b"e"),
                }
                hasher.update([0x1f]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Display format applied to a contiguous column range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFormat {
    /// First column index (0-based, inclusive).
    pub start: usize,
    /// Last column index (exclusive).
    pub end: usize,
    pub kind: NumberFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberFormat {
    /// Plain text, preserving leading zeros in product codes.
    Text,
    /// Number rendered with the given pattern, e.g. `#,##0.00`.
    Number { pattern: String },
}

/// The two formats applied after every publish: codes as text, prices as
/// two-decimal numbers.
pub fn published_formats() -> Vec<ColumnFormat> {
    vec![
        ColumnFormat {
            start: 0,
            end: 1,
            kind: NumberFormat::Text,
        },
        ColumnFormat {
            start: FIRST_PRICE_COLUMN,
            end: COLUMN_COUNT,
            kind: NumberFormat::Number {
                pattern: "#,##0.00".into(),
            },
        },
    ]
}
