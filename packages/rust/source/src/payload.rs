//! Typed response envelopes for the source API and record mapping.
//!
//! Payloads are narrowed here; nothing untyped leaves this module except the
//! scalar leaves inspected by the mapping functions.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use caddis_shared::pricing::{compute_inclusive_price, parse_decimal};
use caddis_shared::{Article, PriceEntry, PriceListId, Result, SyncError};

/// Upstream status value marking a retired article.
const INACTIVE_STATUS: &str = "INACTIVO";

// ---------------------------------------------------------------------------
// Catalog endpoint
// ---------------------------------------------------------------------------

/// `GET /v1/articulos?pagina=N` response.
#[derive(Debug, Deserialize)]
pub struct CatalogEnvelope {
    #[serde(default)]
    pub body: CatalogBody,
}

/// The catalog `body` field: a list of articles, or anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogBody {
    Articles(Vec<CatalogItem>),
    Unrecognized(Value),
}

impl Default for CatalogBody {
    fn default() -> Self {
        Self::Unrecognized(Value::Null)
    }
}

impl CatalogBody {
    /// The page's records; a non-list body counts as an empty batch.
    pub fn into_items(self) -> Vec<CatalogItem> {
        match self {
            Self::Articles(items) => items,
            Self::Unrecognized(_) => Vec::new(),
        }
    }
}

/// One element of the catalog list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogItem {
    Article(RawArticle),
    Malformed(Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub sku: Option<Value>,
    #[serde(default)]
    pub nombre: Option<Value>,
    #[serde(default)]
    pub tipo: Option<Value>,
    #[serde(default)]
    pub marca: Option<Value>,
    #[serde(default)]
    pub grupo: Option<Value>,
    #[serde(default)]
    pub estado: Option<Value>,
}

/// Result of mapping one catalog record.
#[derive(Debug, PartialEq, Eq)]
pub enum ArticleMapping {
    Active(Article),
    Inactive,
    MissingSku,
}

impl RawArticle {
    pub fn is_inactive(&self) -> bool {
        text(self.estado.as_ref()).to_uppercase() == INACTIVE_STATUS
    }

    /// Map to an [`Article`], filtering inactive and code-less records.
    pub fn into_mapping(self) -> ArticleMapping {
        if self.is_inactive() {
            return ArticleMapping::Inactive;
        }
        let sku = text(self.sku.as_ref());
        if sku.is_empty() {
            return ArticleMapping::MissingSku;
        }
        ArticleMapping::Active(Article {
            id: self.id.as_ref().map(|v| text(Some(v))).filter(|s| !s.is_empty()),
            sku,
            nombre: text(self.nombre.as_ref()),
            tipo: text(self.tipo.as_ref()),
            marca: text(self.marca.as_ref()),
            grupo: text(self.grupo.as_ref()),
        })
    }
}

// ---------------------------------------------------------------------------
// Price endpoint
// ---------------------------------------------------------------------------

/// `GET /v1/articulos/precios?pagina=N&lista=L&mostrar_sin_precio=true` response.
#[derive(Debug, Deserialize)]
pub struct PriceEnvelope {
    #[serde(default)]
    pub body: PriceBody,
}

/// The price `body` field: an object holding `articulos`, or anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PriceBody {
    Page(PricePage),
    Unrecognized(Value),
}

impl Default for PriceBody {
    fn default() -> Self {
        Self::Unrecognized(Value::Null)
    }
}

impl PriceBody {
    /// The page's records; anything but an object with `articulos` is empty.
    pub fn into_items(self) -> Vec<PriceItem> {
        match self {
            Self::Page(page) => page.articulos,
            Self::Unrecognized(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PricePage {
    #[serde(default)]
    pub articulos: Vec<PriceItem>,
}

/// One element of the `articulos` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PriceItem {
    Price(RawPrice),
    Malformed(Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct RawPrice {
    #[serde(default)]
    pub sku: Option<Value>,
    /// `None` when absent, `Some(Value::Null)` when explicitly null.
    #[serde(default, deserialize_with = "present")]
    pub precio_unitario: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub iva_tasa: Option<Value>,
}

/// Result of mapping one price record.
#[derive(Debug, PartialEq, Eq)]
pub enum PriceMapping {
    Entry(PriceEntry),
    MissingSku,
}

impl RawPrice {
    pub fn sku(&self) -> String {
        text(self.sku.as_ref())
    }

    /// Convert to a tax-inclusive [`PriceEntry`] for `list`.
    ///
    /// Absent numeric fields count as zero; null or non-numeric values are a
    /// conversion error.
    pub fn into_mapping(self, list: PriceListId) -> Result<PriceMapping> {
        let base = decimal("precio_unitario", self.precio_unitario.as_ref())?;
        let tax_rate = decimal("iva_tasa", self.iva_tasa.as_ref())?;
        let unit_price = compute_inclusive_price(base, tax_rate)?;

        let sku = self.sku();
        if sku.is_empty() {
            return Ok(PriceMapping::MissingSku);
        }
        Ok(PriceMapping::Entry(PriceEntry {
            sku,
            list_id: list,
            tax_rate,
            unit_price,
        }))
    }
}

/// Keep explicit `null` distinguishable from an absent field.
fn present<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

// ---------------------------------------------------------------------------
// Scalar coercion
// ---------------------------------------------------------------------------

/// Render a scalar as display text; null/absent is empty.
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn decimal(field: &'static str, value: Option<&Value>) -> Result<Decimal> {
    match value {
        None => Ok(Decimal::ZERO),
        Some(Value::Number(n)) => parse_decimal(field, &n.to_string()),
        Some(Value::String(s)) => parse_decimal(field, s),
        Some(other) => Err(SyncError::conversion(field, other.to_string())),
    }
}
