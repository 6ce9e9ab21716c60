//! HTML extraction for explorer pages.
//!
//! Transaction pages are read by structural position: the `table.info` table
//! carries the full transaction id, and the second top-level table holds the
//! inputs and outputs as two nested tables in its second row.

use crate::error::{Result, ScanError};
use crate::result::{TransactionNode, TxId};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

const TXID_MARKER: &str = "/txid/";
const PAGE_MARKER: &str = "Page 1 / ";
const DEFAULT_SEARCH_FIELD: &str = "q";

static TABLE: LazyLock<Selector> = LazyLock::new(|| css("table"));
static INFO_CELL: LazyLock<Selector> = LazyLock::new(|| css("table.info td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| css("a[href]"));
static SMALL_CELL: LazyLock<Selector> = LazyLock::new(|| css("td.small"));
static CELL: LazyLock<Selector> = LazyLock::new(|| css("td"));
static ROW: LazyLock<Selector> = LazyLock::new(|| css("tr"));
static FORM: LazyLock<Selector> = LazyLock::new(|| css("form"));
static INPUT: LazyLock<Selector> = LazyLock::new(|| css("input"));

fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Search form found on the explorer's home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchForm {
    pub action: String,
    pub field: String,
}

/// Parse a transaction detail page into a node.
///
/// `seed` switches input rows to verbatim labels, which is how coinbase
/// inputs ("new coins") are shown.
pub fn parse_transaction_page(html: &str, requested_id: &str, seed: bool) -> Result<TransactionNode> {
    let document = Html::parse_document(html);

    let id = document
        .select(&INFO_CELL)
        .next()
        .map(|cell| collapse_text(cell))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| requested_id.to_string());

    let tables = top_level_tables(&document);
    let tx_table = tables
        .get(1)
        .ok_or_else(|| ScanError::ParseError("transaction table not found".to_string()))?;

    let rows = direct_rows(*tx_table);
    let io_row = rows
        .get(1)
        .ok_or_else(|| ScanError::ParseError("transaction table has no inputs/outputs row".to_string()))?;

    let cells = direct_cells(*io_row);
    let (inputs_cell, outputs_cell) = match (cells.first(), cells.get(1)) {
        (Some(inputs), Some(outputs)) => (*inputs, *outputs),
        _ => {
            return Err(ScanError::ParseError(
                "inputs/outputs cells not found".to_string(),
            ));
        }
    };

    let inputs: Vec<TxId> = nested_rows(inputs_cell)
        .into_iter()
        .filter_map(|row| {
            if seed {
                row.select(&CELL).next().map(collapse_text).filter(|t| !t.is_empty())
            } else {
                input_reference(row)
            }
        })
        .collect();

    let outputs: Vec<TxId> = nested_rows(outputs_cell)
        .into_iter()
        .filter_map(|row| {
            let reference = linked_txid(row);
            if reference.is_none() {
                debug!("Skipping output row without transaction link: {}", collapse_text(row));
            }
            reference
        })
        .collect();

    Ok(TransactionNode::new(id, inputs, outputs))
}

/// Locate the search form and the name of its text field.
pub fn parse_search_form(html: &str) -> Option<SearchForm> {
    let document = Html::parse_document(html);

    for form in document.select(&FORM) {
        let text_input = form.select(&INPUT).find(|input| {
            matches!(
                input.value().attr("type").map(str::to_ascii_lowercase).as_deref(),
                None | Some("text") | Some("search")
            )
        });

        if let Some(input) = text_input {
            return Some(SearchForm {
                action: form.value().attr("action").unwrap_or("").to_string(),
                field: input
                    .value()
                    .attr("name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or(DEFAULT_SEARCH_FIELD)
                    .to_string(),
            });
        }
    }

    None
}

/// Read `N` from a "Page 1 / N" pagination marker.
pub fn parse_page_count(html: &str) -> Option<usize> {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect();

    let start = text.find(PAGE_MARKER)? + PAGE_MARKER.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok().filter(|count: &usize| *count > 0)
}

/// Addresses listed in the first table of a wallet's address page: the last
/// path segment of the link in each row's first cell.
pub fn parse_wallet_addresses(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&TABLE).next() else {
        return Vec::new();
    };

    table
        .select(&ROW)
        .filter_map(|row| {
            let cell = row.select(&CELL).next()?;
            let href = cell.select(&LINK).next()?.value().attr("href")?;
            let address = href.trim_end_matches('/').rsplit('/').next()?;
            (!address.is_empty()).then(|| address.to_string())
        })
        .collect()
}

/// Extract the id following the `/txid/` marker in a link target.
pub fn txid_from_href(href: &str) -> Option<TxId> {
    let (_, rest) = href.split_once(TXID_MARKER)?;
    let id = rest.split(['?', '#', '/']).next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

fn linked_txid(row: ElementRef<'_>) -> Option<TxId> {
    row.select(&LINK)
        .filter_map(|link| link.value().attr("href"))
        .find_map(txid_from_href)
}

fn input_reference(row: ElementRef<'_>) -> Option<TxId> {
    if let Some(id) = linked_txid(row) {
        return Some(id);
    }

    let label = match row.select(&SMALL_CELL).next() {
        Some(small) => small
            .select(&LINK)
            .next()
            .map(collapse_text)
            .unwrap_or_else(|| collapse_text(small)),
        None => row.select(&CELL).next().map(collapse_text)?,
    };

    (!label.is_empty()).then_some(label)
}

fn nested_rows(cell: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    cell.select(&TABLE).next().map(direct_rows).unwrap_or_default()
}

fn top_level_tables(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .select(&TABLE)
        .filter(|table| {
            !table.ancestors().any(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|element| element.name() == "table")
            })
        })
        .collect()
}

fn direct_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|row| row.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| cell.value().name() == "td")
        .collect()
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
