//! Types for Tally protocol records and parse diagnostics

use serde::{Deserialize, Deserializer, Serialize};

/// A company as reported by Tally's company collection.
///
/// Financial year bounds are kept in Tally's own `YYYYMMDD` string form; the
/// dashboards format them for display and nothing in this layer does date
/// arithmetic on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(alias = "NAME")]
    pub name: String,
    /// Start of the financial year, e.g. "20240401".
    #[serde(default, alias = "startingFrom", alias = "financial_year_start")]
    pub financial_year_start: String,
    /// End of the financial year, e.g. "20250331".
    #[serde(default, alias = "endingAt", alias = "financial_year_end")]
    pub financial_year_end: String,
}

/// A ledger account with its closing balance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(alias = "NAME")]
    pub name: String,
    /// Parent group name, empty for top-level ledgers.
    #[serde(default, alias = "PARENT")]
    pub parent: String,
    #[serde(
        default,
        alias = "closing_balance",
        deserialize_with = "lenient_amount"
    )]
    pub closing_balance: f64,
}

/// A voucher (transaction entry) from the voucher register.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    /// Voucher date in Tally's `YYYYMMDD` form.
    #[serde(default, alias = "DATE")]
    pub date: String,
    #[serde(default, alias = "voucher_number", alias = "VOUCHERNUMBER")]
    pub voucher_number: String,
    #[serde(default, alias = "voucher_type", alias = "VOUCHERTYPENAME")]
    pub voucher_type: String,
    #[serde(default, alias = "AMOUNT", deserialize_with = "lenient_amount")]
    pub amount: f64,
}

/// Connectivity verdict from scanning a status-probe response.
///
/// `Connected` requires a well-formed `COMPANY` element in the document, not
/// just a plausible-looking body. `Unknown` covers bodies too short or too
/// opaque to judge either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A numeric field that failed to parse and was degraded to zero.
///
/// Dashboards still render when a single balance is mangled; the warning
/// channel exists so callers can log or count the degradations instead of
/// losing them silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Record tag the field belongs to, e.g. "LEDGER".
    pub record: String,
    /// Field tag that failed, e.g. "CLOSINGBALANCE".
    pub field: String,
    /// The raw text that could not be parsed.
    pub raw: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}: unparseable value {:?} degraded to 0",
            self.record, self.field, self.raw
        )
    }
}

/// Accept amounts as JSON numbers or numeric strings, degrading to 0 on
/// anything else. Bridge and backup backends disagree on which they emit.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_balance_accepts_number_or_string() {
        let from_number: Ledger =
            serde_json::from_value(serde_json::json!({"name": "Cash", "closingBalance": 150.5}))
                .unwrap();
        assert_eq!(from_number.closing_balance, 150.5);

        let from_string: Ledger = serde_json::from_value(
            serde_json::json!({"name": "Cash", "closing_balance": "150.5"}),
        )
        .unwrap();
        assert_eq!(from_string.closing_balance, 150.5);
    }

    #[test]
    fn ledger_balance_degrades_to_zero() {
        let mangled: Ledger =
            serde_json::from_value(serde_json::json!({"name": "Cash", "closingBalance": "n/a"}))
                .unwrap();
        assert_eq!(mangled.closing_balance, 0.0);
    }

    #[test]
    fn company_accepts_snake_case_aliases() {
        let company: Company = serde_json::from_value(serde_json::json!({
            "name": "Acme",
            "financial_year_start": "20240401",
            "financial_year_end": "20250331",
        }))
        .unwrap();
        assert_eq!(company.financial_year_start, "20240401");
        assert_eq!(company.financial_year_end, "20250331");
    }
}
