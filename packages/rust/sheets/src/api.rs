//! Request and response bodies for the Sheets v4 REST API.
//!
//! Only the fields this crate reads or writes are modelled.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use caddis_shared::{COLUMN_COUNT, Cell, ColumnFormat, NumberFormat, Table};

/// Grid size for a newly created sheet.
pub const NEW_SHEET_ROWS: u32 = 1000;
pub const NEW_SHEET_COLUMNS: u32 = COLUMN_COUNT as u32;

// ---------------------------------------------------------------------------
// spreadsheets.get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Spreadsheet {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
pub struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(default)]
    pub title: String,
}

impl Spreadsheet {
    pub fn find(&self, title: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|s| s.properties.title == title)
            .map(|s| s.properties.sheet_id)
    }
}

// ---------------------------------------------------------------------------
// spreadsheets.batchUpdate
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BatchUpdate {
    pub requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    AddSheet {
        properties: NewSheet,
    },
    RepeatCell {
        range: GridRange,
        cell: CellData,
        fields: &'static str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSheet {
    pub title: String,
    pub grid_properties: GridProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    pub row_count: u32,
    pub column_count: u32,
}

/// Whole-column range: no row bounds.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    pub start_column_index: usize,
    pub end_column_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub user_entered_format: CellFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    pub number_format: NumberFormatSpec,
}

#[derive(Debug, Serialize)]
pub struct NumberFormatSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Request {
    pub fn add_sheet(title: &str) -> Self {
        Self::AddSheet {
            properties: NewSheet {
                title: title.to_string(),
                grid_properties: GridProperties {
                    row_count: NEW_SHEET_ROWS,
                    column_count: NEW_SHEET_COLUMNS,
                },
            },
        }
    }

    /// A `repeatCell` setting the number format over a column range.
    pub fn column_format(sheet_id: i64, format: &ColumnFormat) -> Self {
        let number_format = match &format.kind {
            NumberFormat::Text => NumberFormatSpec {
                kind: "TEXT",
                pattern: None,
            },
            NumberFormat::Number { pattern } => NumberFormatSpec {
                kind: "NUMBER",
                pattern: Some(pattern.clone()),
            },
        };
        Self::RepeatCell {
            range: GridRange {
                sheet_id,
                start_column_index: format.start,
                end_column_index: format.end,
            },
            cell: CellData {
                user_entered_format: CellFormat { number_format },
            },
            fields: "userEnteredFormat.numberFormat",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default)]
    pub add_sheet: Option<Sheet>,
}

// ---------------------------------------------------------------------------
// spreadsheets.values.update
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub range: String,
    pub major_dimension: &'static str,
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    /// Header row followed by data rows, anchored at `range`.
    pub fn from_table(range: String, table: &Table) -> Self {
        let header: Vec<Value> = table.header.iter().map(|h| Value::String(h.clone())).collect();
        let rows = table
            .rows
            .iter()
            .map(|row| row.iter().map(cell_value).collect::<Vec<_>>());
        Self {
            range,
            major_dimension: "ROWS",
            values: std::iter::once(header).chain(rows).collect(),
        }
    }
}

/// Numbers go out as JSON numbers so the sheet can format them; empty cells
/// as empty strings.
fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Number(d) => number_value(*d),
        Cell::Empty => Value::String(String::new()),
    }
}

fn number_value(d: Decimal) -> Value {
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

/// A1 notation for a whole sheet, quoted so spaces and quotes survive.
pub fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
