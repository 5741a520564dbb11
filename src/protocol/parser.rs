//! Tolerant scanning of Tally XML response documents.
//!
//! Tally responses are large, flat and occasionally mangled; the parser never
//! fails a whole document for one bad element. Unclosed elements are skipped,
//! unparseable numeric fields degrade to zero with a `ParseWarning`, and a
//! malformed document simply yields no records. Callers must therefore treat
//! an empty result as "possibly no data", not "definitely success".

use super::types::{Company, ConnectionStatus, Ledger, ParseWarning, Voucher};

/// Parse every `COMPANY` element in the document.
pub fn parse_companies(xml: &str) -> Vec<Company> {
    element_blocks(xml, "COMPANY")
        .into_iter()
        .filter_map(|block| {
            let name = child_text(block, "NAME")?;
            Some(Company {
                name,
                financial_year_start: child_text(block, "STARTINGFROM").unwrap_or_default(),
                financial_year_end: child_text(block, "ENDINGAT").unwrap_or_default(),
            })
        })
        .collect()
}

/// Parse every `LEDGER` element, reporting numeric fields that degraded to 0.
pub fn parse_ledgers_with_warnings(xml: &str) -> (Vec<Ledger>, Vec<ParseWarning>) {
    let mut warnings = Vec::new();
    let ledgers = element_blocks(xml, "LEDGER")
        .into_iter()
        .filter_map(|block| {
            let name = child_text(block, "NAME")?;
            Some(Ledger {
                name,
                parent: child_text(block, "PARENT").unwrap_or_default(),
                closing_balance: amount_field(block, "LEDGER", "CLOSINGBALANCE", &mut warnings),
            })
        })
        .collect();
    (ledgers, warnings)
}

/// Parse every `VOUCHER` element, reporting numeric fields that degraded to 0.
pub fn parse_vouchers_with_warnings(xml: &str) -> (Vec<Voucher>, Vec<ParseWarning>) {
    let mut warnings = Vec::new();
    let vouchers = element_blocks(xml, "VOUCHER")
        .into_iter()
        .map(|block| Voucher {
            date: child_text(block, "DATE").unwrap_or_default(),
            voucher_number: child_text(block, "VOUCHERNUMBER").unwrap_or_default(),
            voucher_type: child_text(block, "VOUCHERTYPENAME").unwrap_or_default(),
            amount: amount_field(block, "VOUCHER", "AMOUNT", &mut warnings),
        })
        .collect();
    (vouchers, warnings)
}

/// Judge connectivity from a status-probe response body.
///
/// A well-formed `COMPANY` element proves a live Tally behind the endpoint.
/// A substantial document without one means the endpoint answered but Tally
/// did not hand over data. Anything shorter is unjudgeable.
pub fn scan_connection(xml: &str) -> ConnectionStatus {
    if !element_blocks(xml, "COMPANY").is_empty() {
        return ConnectionStatus::Connected;
    }
    let trimmed = xml.trim();
    if trimmed.len() > 50 && (trimmed.contains("<ENVELOPE") || trimmed.contains("</")) {
        ConnectionStatus::Disconnected
    } else {
        ConnectionStatus::Unknown
    }
}

/// Extract the inner text of every well-formed `<TAG>…</TAG>` element.
///
/// Elements with attributes and self-closing forms are recognized; elements
/// missing their close tag are skipped entirely. Record elements never nest
/// in Tally exports, so a second open tag before the close means the earlier
/// element was truncated.
fn element_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open_prefix = format!("<{tag}");
    let close_tag = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_open(xml, cursor, &open_prefix) {
        let after_name = start + open_prefix.len();
        let tail = &xml[after_name..];
        let Some(gt) = tail.find('>') else {
            break;
        };
        let content_start = after_name + gt + 1;
        if tail[..gt].ends_with('/') {
            // Self-closing element carries no fields.
            cursor = content_start;
            continue;
        }
        let Some(end) = xml[content_start..].find(&close_tag) else {
            // Unclosed element: skip rather than guess at its extent.
            cursor = content_start;
            continue;
        };
        let inner = &xml[content_start..content_start + end];
        match find_open(inner, 0, &open_prefix) {
            // A new record opened before this one closed, so this element was
            // truncated; rescan from the newer open tag.
            Some(next) => cursor = content_start + next,
            None => {
                blocks.push(inner);
                cursor = content_start + end + close_tag.len();
            }
        }
    }

    blocks
}

/// Find the next occurrence of the open tag at a real tag boundary, so
/// `<LEDGER` does not match `<LEDGERNAME`.
fn find_open(xml: &str, from: usize, open_prefix: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(found) = xml[cursor..].find(open_prefix) {
        let start = cursor + found;
        let after = start + open_prefix.len();
        match xml[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            Some(_) => cursor = after,
            None => return None,
        }
    }
    None
}

/// Inner text of the first well-formed `<FIELD>…</FIELD>` child, unescaped.
fn child_text(block: &str, field: &str) -> Option<String> {
    let inner = element_blocks(block, field).into_iter().next()?;
    Some(xml_unescape(inner.trim()))
}

/// Reverse of `xml_escape`; `&amp;` last so produced entities are not re-read.
fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Parse a numeric field with float semantics, degrading to 0 on failure.
///
/// Tally writes amounts with Indian digit grouping ("1,50,000.00"), so commas
/// are stripped before parsing.
fn amount_field(
    block: &str,
    record: &str,
    field: &str,
    warnings: &mut Vec<ParseWarning>,
) -> f64 {
    let Some(raw) = child_text(block, field) else {
        return 0.0;
    };
    match raw.replace(',', "").parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            warnings.push(ParseWarning {
                record: record.to_string(),
                field: field.to_string(),
                raw,
            });
            0.0
        }
    }
}
