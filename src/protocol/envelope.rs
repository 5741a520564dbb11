//! Request envelope construction for Tally's XML protocol.
//!
//! Envelopes are built from string templates, with every caller-supplied value
//! passed through `xml_escape` before embedding. Tally rejects requests with
//! stray markup characters silently, so escaping here is load-bearing.

use chrono::NaiveDate;
use std::time::Duration;

/// The logical operations the codec knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// List companies available on the Tally instance.
    CompanyList,
    /// List ledgers with closing balances for one company.
    LedgerList,
    /// Voucher register for one company over a date range.
    VoucherList,
    /// Lightweight probe used for status checks.
    ConnectionTest,
}

impl RequestKind {
    /// Per-operation request timeout, scaled for expected payload size.
    pub fn timeout(&self) -> Duration {
        match self {
            RequestKind::ConnectionTest => Duration::from_secs(5),
            RequestKind::CompanyList => Duration::from_secs(30),
            RequestKind::LedgerList => Duration::from_secs(60),
            RequestKind::VoucherList => Duration::from_secs(120),
        }
    }

    /// Tally collection ID exported by this request.
    fn collection_id(&self) -> &'static str {
        match self {
            // The probe exports the company list too; only the timeout differs.
            RequestKind::CompanyList | RequestKind::ConnectionTest => "List of Companies",
            RequestKind::LedgerList => "List of Ledgers",
            RequestKind::VoucherList => "Voucher Register",
        }
    }

    /// Element tag of the records this request yields.
    pub fn record_tag(&self) -> &'static str {
        match self {
            RequestKind::CompanyList | RequestKind::ConnectionTest => "COMPANY",
            RequestKind::LedgerList => "LEDGER",
            RequestKind::VoucherList => "VOUCHER",
        }
    }
}

/// Parameters embedded into a request envelope.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    /// Target company, required for ledger and voucher requests.
    pub company: Option<String>,
    /// Inclusive date range for voucher requests.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl RequestParams {
    /// Params targeting one company.
    pub fn for_company(company: impl Into<String>) -> Self {
        Self {
            company: Some(company.into()),
            date_range: None,
        }
    }

    /// Params targeting one company over an inclusive date range.
    pub fn for_period(company: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            company: Some(company.into()),
            date_range: Some((from, to)),
        }
    }
}

/// A fully rendered XML request body ready for HTTP POST.
#[derive(Debug, Clone)]
pub struct XmlEnvelope {
    body: String,
}

impl XmlEnvelope {
    /// The rendered XML document.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the envelope, yielding the XML document.
    pub fn into_body(self) -> String {
        self.body
    }
}

/// Escape `&`, `<` and `>` for embedding into XML text content.
///
/// `&` must be replaced first or the other substitutions would be re-escaped.
pub fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build the request envelope for the given operation.
///
/// # Arguments
/// * `kind` - The logical operation to request.
/// * `params` - Company and date-range parameters; ignored where the
///   operation does not use them.
///
/// # Returns
/// An `XmlEnvelope` whose body is the complete Tally export request.
pub fn build_request(kind: RequestKind, params: &RequestParams) -> XmlEnvelope {
    let mut static_vars = String::new();

    if let Some(company) = &params.company {
        static_vars.push_str(&format!(
            "<SVCURRENTCOMPANY>{}</SVCURRENTCOMPANY>",
            xml_escape(company)
        ));
    }

    if let Some((from, to)) = &params.date_range {
        static_vars.push_str(&format!(
            "<SVFROMDATE>{}</SVFROMDATE><SVTODATE>{}</SVTODATE>",
            from.format("%Y%m%d"),
            to.format("%Y%m%d")
        ));
    }

    let body = format!(
        r#"<ENVELOPE>
    <HEADER>
        <VERSION>1</VERSION>
        <TALLYREQUEST>Export</TALLYREQUEST>
        <TYPE>Collection</TYPE>
        <ID>{id}</ID>
    </HEADER>
    <BODY>
        <DESC>
            <STATICVARIABLES>
                {static_vars}<SVEXPORTFORMAT>$$SysName:XML</SVEXPORTFORMAT>
            </STATICVARIABLES>
        </DESC>
    </BODY>
</ENVELOPE>"#,
        id = kind.collection_id(),
        static_vars = static_vars,
    );

    XmlEnvelope { body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_leaves_no_unescaped_markup() {
        let escaped = xml_escape("A & B <Pvt> Ltd & <Sons>");
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        // Every remaining ampersand must start an entity we produced.
        for (i, _) in escaped.match_indices('&') {
            let rest = &escaped[i..];
            assert!(
                rest.starts_with("&amp;") || rest.starts_with("&lt;") || rest.starts_with("&gt;"),
                "stray ampersand in {escaped:?}"
            );
        }
    }

    #[test]
    fn escape_matches_single_pass_substitution() {
        // Escaping is a pure single-pass substitution: each source character
        // maps to exactly one entity, so the output length is predictable.
        let input = "&<>";
        assert_eq!(xml_escape(input), "&amp;&lt;&gt;");
    }

    #[test]
    fn company_name_is_escaped_into_envelope() {
        let params = RequestParams::for_company("Johnson & Sons <Exports>");
        let envelope = build_request(RequestKind::LedgerList, &params);
        assert!(
            envelope
                .body()
                .contains("<SVCURRENTCOMPANY>Johnson &amp; Sons &lt;Exports&gt;</SVCURRENTCOMPANY>")
        );
    }

    #[test]
    fn voucher_request_carries_date_range() {
        let from = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let params = RequestParams::for_period("Acme", from, to);
        let envelope = build_request(RequestKind::VoucherList, &params);
        assert!(envelope.body().contains("<SVFROMDATE>20240401</SVFROMDATE>"));
        assert!(envelope.body().contains("<SVTODATE>20250331</SVTODATE>"));
        assert!(envelope.body().contains("<ID>Voucher Register</ID>"));
    }

    #[test]
    fn timeouts_scale_with_expected_payload() {
        assert_eq!(RequestKind::ConnectionTest.timeout(), Duration::from_secs(5));
        assert_eq!(RequestKind::CompanyList.timeout(), Duration::from_secs(30));
        assert_eq!(RequestKind::LedgerList.timeout(), Duration::from_secs(60));
        assert_eq!(RequestKind::VoucherList.timeout(), Duration::from_secs(120));
    }
}
