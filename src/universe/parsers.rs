use anyhow::{Result, bail};
use scraper::{ElementRef, Html, Selector};

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("selector {:?}: {:?}", s, e))
}

/// Cell text with footnote markers such as `[a]` removed.
fn cell_text(cell: ElementRef<'_>) -> String {
    let text: String = cell.text().collect();
    let text = text.split('[').next().unwrap_or_default();
    text.trim().to_string()
}

// ── Index membership table ────────────────────────────────────────────────────

/// Symbols from the first table whose header row has `column`.
///
/// Wikipedia marks the membership table with `id="constituents"`, so that
/// table is tried first; any other table with a matching header is the fallback.
pub fn parse_constituents(html: &str, column: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);

    let preferred = selector("table#constituents")?;
    let any_table = selector("table")?;
    let tr_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    for table in doc.select(&preferred).chain(doc.select(&any_table)) {
        let mut rows = table.select(&tr_sel);
        let Some(header) = rows.next() else { continue };

        let headers: Vec<String> = header.select(&cell_sel).map(cell_text).collect();
        let Some(idx) = headers.iter().position(|h| h.eq_ignore_ascii_case(column)) else {
            continue;
        };

        let symbols: Vec<String> = rows
            .filter_map(|tr| tr.select(&cell_sel).nth(idx))
            .map(cell_text)
            .filter(|s| !s.is_empty())
            .collect();

        if !symbols.is_empty() {
            return Ok(symbols);
        }
    }

    bail!("no table with a {:?} column", column)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SP500: &str = r#"
        <html><body>
        <table class="wikitable"><tr><th>Year</th><th>Symbol</th></tr>
            <tr><td>1957</td><td>n/a</td></tr></table>
        <table class="wikitable sortable" id="constituents">
          <tbody>
            <tr><th>Symbol</th><th>Security</th><th>GICS Sector[3]</th></tr>
            <tr><td><a href="/q/MMM">MMM</a></td><td>3M</td><td>Industrials</td></tr>
            <tr><td><a href="/q/BRK.B">BRK.B</a></td><td>Berkshire Hathaway</td><td>Financials</td></tr>
            <tr><td>AAPL</td><td>Apple Inc.</td><td>Information Technology</td></tr>
          </tbody>
        </table>
        </body></html>"#;

    const NDX: &str = r#"
        <table class="wikitable"><tr><th>Company</th><th>Ticker[12]</th></tr>
          <tr><td>Adobe Inc.</td><td>ADBE</td></tr>
          <tr><td>Apple Inc.</td><td>AAPL</td></tr>
        </table>"#;

    #[test]
    fn test_prefers_constituents_table() {
        let symbols = parse_constituents(SP500, "Symbol").unwrap();
        assert_eq!(symbols, vec!["MMM", "BRK.B", "AAPL"]);
    }

    #[test]
    fn test_header_footnotes_ignored() {
        let symbols = parse_constituents(NDX, "Ticker").unwrap();
        assert_eq!(symbols, vec!["ADBE", "AAPL"]);
    }

    #[test]
    fn test_missing_column_is_error() {
        assert!(parse_constituents(NDX, "Symbol").is_err());
        assert!(parse_constituents("<p>maintenance</p>", "Symbol").is_err());
    }
}
