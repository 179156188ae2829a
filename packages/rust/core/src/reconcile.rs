//! Join of catalog articles and price entries into the published table.
//!
//! Articles are the authoritative key set: a SKU that only appears in price
//! data produces no row. Rows are ordered by SKU so the same input always
//! yields the same table.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use caddis_shared::pricing::{PRICE_DECIMALS, TAX_PERCENT_DECIMALS, round_half_up};
use caddis_shared::{
    Article, COLUMN_COUNT, Cell, PRICE_LISTS, PriceEntry, PriceListId, TAX_DISPLAY_LIST, Table,
};

/// Build the published table from one run's articles and prices.
///
/// - Duplicate articles: the first occurrence of a SKU is kept.
/// - Duplicate `(sku, list)` prices: the last one seen wins.
/// - The `IVA` column comes from list 1's tax rate, blank when absent.
/// - Each price column is blank when the SKU has no entry for that list.
#[instrument(skip_all, fields(articles = articles.len(), prices = prices.len()))]
pub fn combine(articles: &[Article], prices: &[PriceEntry]) -> Table {
    let mut by_sku: BTreeMap<&str, &Article> = BTreeMap::new();
    let mut duplicates = 0usize;
    for article in articles.iter().filter(|a| !a.sku.is_empty()) {
        if by_sku.contains_key(article.sku.as_str()) {
            duplicates += 1;
            continue;
        }
        by_sku.insert(article.sku.as_str(), article);
    }

    let mut price_index: HashMap<&str, HashMap<PriceListId, &PriceEntry>> = HashMap::new();
    for entry in prices {
        price_index
            .entry(entry.sku.as_str())
            .or_default()
            .insert(entry.list_id, entry);
    }

    let orphaned = price_index
        .keys()
        .filter(|sku| !by_sku.contains_key(*sku))
        .count();
    debug!(
        rows = by_sku.len(),
        duplicate_articles = duplicates,
        price_only_skus = orphaned,
        "reconciling"
    );

    let empty = HashMap::new();
    let rows = by_sku
        .into_iter()
        .map(|(sku, article)| build_row(article, price_index.get(sku).unwrap_or(&empty)))
        .collect();

    Table {
        header: Table::published_header(),
        rows,
    }
}

fn build_row(article: &Article, prices: &HashMap<PriceListId, &PriceEntry>) -> Vec<Cell> {
    let mut row = Vec::with_capacity(COLUMN_COUNT);
    row.push(Cell::text(&article.sku));
    row.push(Cell::text(&article.tipo));
    row.push(Cell::text(&article.nombre));
    row.push(Cell::text(&article.grupo));
    row.push(Cell::text(&article.marca));
    row.push(match prices.get(&TAX_DISPLAY_LIST) {
        Some(entry) => Cell::Text(tax_percent_display(entry.tax_rate)),
        None => Cell::text(""),
    });

    row.extend(PRICE_LISTS.iter().map(|list| match prices.get(&list.id) {
        Some(entry) => Cell::Number(round_half_up(entry.unit_price, PRICE_DECIMALS)),
        None => Cell::Empty,
    }));
    row
}

/// Render a fractional tax rate as a one-decimal percentage with a comma
/// separator: `0.105` → `"10,5"`, `0.21` → `"21,0"`. A rate too large to
/// scale renders blank.
pub fn tax_percent_display(rate: Decimal) -> String {
    let Some(scaled) = rate.checked_mul(Decimal::ONE_HUNDRED) else {
        return String::new();
    };
    let mut percent = round_half_up(scaled, TAX_PERCENT_DECIMALS);
    percent.rescale(TAX_PERCENT_DECIMALS);
    percent.to_string().replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn article(sku: &str, nombre: &str) -> Article {
        Article {
            id: None,
            sku: sku.into(),
            nombre: nombre.into(),
            tipo: "Producto".into(),
            marca: "Caddis".into(),
            grupo: "Náutica".into(),
        }
    }

    fn price(sku: &str, list: u32, rate: &str, unit: &str) -> PriceEntry {
        PriceEntry {
            sku: sku.into(),
            list_id: PriceListId::lookup(list).unwrap(),
            tax_rate: dec(rate),
            unit_price: dec(unit),
        }
    }

    fn column_of(list: u32) -> usize {
        6 + PRICE_LISTS
            .iter()
            .position(|l| u32::from(l.id.get()) == list)
            .unwrap()
    }

    #[test]
    fn tax_display_uses_comma_and_one_decimal() {
        assert_eq!(tax_percent_display(dec("0.105")), "10,5");
        assert_eq!(tax_percent_display(dec("0.21")), "21,0");
        assert_eq!(tax_percent_display(dec("0")), "0,0");
        assert_eq!(tax_percent_display(dec("0.10525")), "10,5");
        assert_eq!(tax_percent_display(dec("0.10550")), "10,6");
    }

    #[test]
    fn oversized_tax_rate_leaves_iva_blank() {
        let huge = Decimal::from_scientific("1e27").unwrap();
        assert_eq!(tax_percent_display(huge), "");

        let entry = PriceEntry {
            sku: "A1".into(),
            list_id: TAX_DISPLAY_LIST,
            tax_rate: huge,
            unit_price: Decimal::ZERO,
        };
        let table = combine(&[article("A1", "Ancla")], &[entry]);
        assert_eq!(table.rows[0][5], Cell::text(""));
        assert_eq!(table.rows[0][column_of(1)], Cell::Number(Decimal::ZERO));
    }

    #[test]
    fn rows_are_sorted_and_rectangular() {
        let articles = vec![article("Z9", "Zeta"), article("A1", "Alfa"), article("M5", "Eme")];
        let table = combine(&articles, &[]);

        assert_eq!(table.column_count(), COLUMN_COUNT);
        assert!(table.is_rectangular());
        let skus: Vec<&Cell> = table.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(skus, vec![&Cell::text("A1"), &Cell::text("M5"), &Cell::text("Z9")]);
    }

    #[test]
    fn attribute_columns_follow_header_order() {
        let table = combine(&[article("A1", "Ancla")], &[]);
        let row = &table.rows[0];
        assert_eq!(row[0], Cell::text("A1"));
        assert_eq!(row[1], Cell::text("Producto"));
        assert_eq!(row[2], Cell::text("Ancla"));
        assert_eq!(row[3], Cell::text("Náutica"));
        assert_eq!(row[4], Cell::text("Caddis"));
        assert_eq!(row[5], Cell::text(""));
        assert!(row[6..].iter().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn prices_land_in_their_list_column() {
        let prices = vec![
            price("A1", 1, "0.105", "110.50"),
            price("A1", 33, "0.21", "12.10"),
            price("A1", 7, "0", "99"),
        ];
        let table = combine(&[article("A1", "Ancla")], &prices);
        let row = &table.rows[0];

        assert_eq!(row[5], Cell::text("10,5"));
        assert_eq!(row[column_of(1)], Cell::Number(dec("110.50")));
        assert_eq!(row[column_of(7)], Cell::Number(dec("99")));
        assert_eq!(row[column_of(33)], Cell::Number(dec("12.10")));
        assert_eq!(row[column_of(2)], Cell::Empty);
        assert_eq!(column_of(33), COLUMN_COUNT - 1);
    }

    #[test]
    fn tax_column_is_blank_without_list_one() {
        let prices = vec![price("A1", 2, "0.21", "50")];
        let table = combine(&[article("A1", "Ancla")], &prices);
        assert_eq!(table.rows[0][5], Cell::text(""));
    }

    #[test]
    fn price_only_skus_are_dropped() {
        let prices = vec![price("A1", 1, "0.21", "1"), price("GHOST", 1, "0.21", "2")];
        let table = combine(&[article("A1", "Ancla")], &prices);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][0], Cell::text("A1"));
    }

    #[test]
    fn first_article_wins_and_last_price_wins() {
        let articles = vec![article("A1", "Primero"), article("A1", "Segundo")];
        let prices = vec![price("A1", 1, "0.21", "10"), price("A1", 1, "0.105", "20")];
        let table = combine(&articles, &prices);

        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][2], Cell::text("Primero"));
        assert_eq!(table.rows[0][5], Cell::text("10,5"));
        assert_eq!(table.rows[0][column_of(1)], Cell::Number(dec("20")));
    }

    #[test]
    fn empty_catalog_yields_header_only() {
        let table = combine(&[], &[price("A1", 1, "0.21", "1")]);
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.header, Table::published_header());
    }

    #[test]
    fn combine_is_deterministic() {
        let articles = vec![article("B", "b"), article("A", "a"), article("C", "c")];
        let prices = vec![
            price("C", 3, "0.21", "3"),
            price("A", 1, "0.21", "1"),
            price("B", 2, "0.21", "2"),
        ];
        let first = combine(&articles, &prices);

        let mut shuffled_articles = articles.clone();
        shuffled_articles.reverse();
        let mut shuffled_prices = prices.clone();
        shuffled_prices.reverse();
        let second = combine(&shuffled_articles, &shuffled_prices);

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }
}
