//! Paginated extraction of the catalog and price streams.
//!
//! Both endpoints share one traversal: request pages `1, 2, 3, …` until an
//! exhaustion signal (HTTP 404, or a page whose record list is empty).
//! - Catalog (protocol A): one stream; any other failure aborts the run.
//! - Prices (protocol B): one stream per price list; a failure ends that
//!   list only, keeping the entries already collected from it.

use std::future::Future;

use tracing::{debug, info, instrument, warn};

use caddis_shared::{Article, PriceEntry, PriceListId, Result};

use crate::client::{Fetched, SourceClient};
use crate::payload::{
    ArticleMapping, CatalogEnvelope, CatalogItem, PriceEnvelope, PriceItem, PriceMapping,
};

const CATALOG_PATH: &str = "v1/articulos";
const PRICES_PATH: &str = "v1/articulos/precios";

// ---------------------------------------------------------------------------
// Generic traversal
// ---------------------------------------------------------------------------

/// What a single page request produced.
#[derive(Debug)]
pub enum PageOutcome<T> {
    /// A non-empty page. `records` may be empty when every record was
    /// filtered out; that does not end the stream.
    Batch { records: Vec<T>, skipped: usize },
    /// Stop condition reached; not an error.
    Exhausted(Exhaustion),
}

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    NotFound,
    EmptyBatch,
}

/// Running totals for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Pages that carried records.
    pub pages: u32,
    /// Records dropped by the page mapper.
    pub skipped: usize,
}

/// Drive `fetch_page` over pages `1..` until exhaustion, appending records to
/// `records` and tallies to `stats`.
///
/// On error, everything gathered from earlier pages stays in place.
pub async fn paginate<T, F, Fut>(
    records: &mut Vec<T>,
    stats: &mut Traversal,
    mut fetch_page: F,
) -> Result<Exhaustion>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PageOutcome<T>>>,
{
    let mut page = 1u32;
    loop {
        match fetch_page(page).await? {
            PageOutcome::Batch {
                records: batch,
                skipped,
            } => {
                records.extend(batch);
                stats.pages += 1;
                stats.skipped += skipped;
                page += 1;
            }
            PageOutcome::Exhausted(reason) => {
                debug!(page, ?reason, "stream exhausted");
                return Ok(reason);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Active articles extracted from the catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogFetch {
    pub articles: Vec<Article>,
    /// Pages read and records dropped (inactive, no code, malformed).
    pub traversal: Traversal,
}

/// Union of price entries across all requested lists.
#[derive(Debug, Clone, Default)]
pub struct PriceFetch {
    pub entries: Vec<PriceEntry>,
    /// Lists whose traversal stopped on an error (list id, error message).
    pub failed_lists: Vec<(PriceListId, String)>,
    /// Pages read and records dropped (non-numeric values, no code, malformed).
    pub traversal: Traversal,
}

// ---------------------------------------------------------------------------
// Protocols
// ---------------------------------------------------------------------------

impl SourceClient {
    /// Fetch every active article (protocol A).
    ///
    /// Any failure other than the exhaustion signal is returned as an error;
    /// no partial catalog is produced.
    #[instrument(skip_all)]
    pub async fn fetch_articles(&self) -> Result<CatalogFetch> {
        info!("starting articles extraction");

        let mut result = CatalogFetch::default();
        paginate(&mut result.articles, &mut result.traversal, |page| {
            self.catalog_page(page)
        })
        .await?;

        info!(
            total = result.articles.len(),
            pages = result.traversal.pages,
            skipped = result.traversal.skipped,
            "articles extraction complete"
        );
        Ok(result)
    }

    /// Fetch prices for every list in `lists` (protocol B).
    ///
    /// Never fails as a whole: a list that errors is logged, recorded in
    /// [`PriceFetch::failed_lists`], and the next list is processed.
    #[instrument(skip_all, fields(lists = lists.len()))]
    pub async fn fetch_prices(&self, lists: &[PriceListId]) -> PriceFetch {
        info!("starting prices extraction");
        let mut result = PriceFetch::default();

        for &list in lists {
            info!(list_id = %list, "processing price list");
            let before = result.entries.len();

            let outcome = paginate(&mut result.entries, &mut result.traversal, |page| {
                self.price_page(list, page)
            })
            .await;

            let collected = result.entries.len() - before;
            match outcome {
                Ok(_) => {
                    info!(list_id = %list, entries = collected, "price list complete");
                }
                Err(e) => {
                    warn!(
                        list_id = %list,
                        entries = collected,
                        error = %e,
                        "skipping remaining pages for price list due to error"
                    );
                    result.failed_lists.push((list, e.to_string()));
                }
            }
        }

        info!(
            total = result.entries.len(),
            failed_lists = result.failed_lists.len(),
            skipped = result.traversal.skipped,
            "prices extraction complete"
        );
        result
    }

    async fn catalog_page(&self, page: u32) -> Result<PageOutcome<Article>> {
        let url = self.endpoint(CATALOG_PATH, &[("pagina", page.to_string())])?;
        let envelope = match self.get_json::<CatalogEnvelope>(url).await? {
            Fetched::NotFound => {
                info!(page, "no more articles (404)");
                return Ok(PageOutcome::Exhausted(Exhaustion::NotFound));
            }
            Fetched::Body(envelope) => envelope,
        };

        let items = envelope.body.into_items();
        if items.is_empty() {
            info!(page, "no more articles (empty page)");
            return Ok(PageOutcome::Exhausted(Exhaustion::EmptyBatch));
        }

        let raw_count = items.len();
        let mut records = Vec::with_capacity(raw_count);
        let mut inactive = 0usize;
        let mut invalid = 0usize;
        for item in items {
            match item {
                CatalogItem::Article(raw) => match raw.into_mapping() {
                    ArticleMapping::Active(article) => records.push(article),
                    ArticleMapping::Inactive => inactive += 1,
                    ArticleMapping::MissingSku => invalid += 1,
                },
                CatalogItem::Malformed(value) => {
                    warn!(page, record = %value, "malformed article record skipped");
                    invalid += 1;
                }
            }
        }

        info!(
            page,
            count = raw_count,
            active = records.len(),
            inactive,
            invalid,
            "extracted articles page"
        );
        Ok(PageOutcome::Batch {
            records,
            skipped: inactive + invalid,
        })
    }

    async fn price_page(&self, list: PriceListId, page: u32) -> Result<PageOutcome<PriceEntry>> {
        let url = self.endpoint(
            PRICES_PATH,
            &[
                ("pagina", page.to_string()),
                ("lista", list.to_string()),
                ("mostrar_sin_precio", "true".into()),
            ],
        )?;

        let envelope = match self.get_json::<PriceEnvelope>(url).await? {
            Fetched::NotFound => {
                info!(list_id = %list, page, "no more pages for price list (404)");
                return Ok(PageOutcome::Exhausted(Exhaustion::NotFound));
            }
            Fetched::Body(envelope) => envelope,
        };

        let items = envelope.body.into_items();
        if items.is_empty() {
            info!(list_id = %list, page, "no more data for price list");
            return Ok(PageOutcome::Exhausted(Exhaustion::EmptyBatch));
        }

        let raw_count = items.len();
        let mut records = Vec::with_capacity(raw_count);
        let mut skipped = 0usize;
        for item in items {
            let raw = match item {
                PriceItem::Price(raw) => raw,
                PriceItem::Malformed(value) => {
                    warn!(list_id = %list, page, record = %value, "malformed price record skipped");
                    skipped += 1;
                    continue;
                }
            };

            let sku = raw.sku();
            match raw.into_mapping(list) {
                Ok(PriceMapping::Entry(entry)) => records.push(entry),
                Ok(PriceMapping::MissingSku) => {
                    debug!(list_id = %list, page, "price record without sku skipped");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(list_id = %list, %sku, error = %e, "non-numeric price or tax, record skipped");
                    skipped += 1;
                }
            }
        }

        info!(list_id = %list, page, count = raw_count, "extracted prices page");
        Ok(PageOutcome::Batch { records, skipped })
    }
}
