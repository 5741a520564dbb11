//! Tally XML protocol module
//!
//! This module provides the codec for Tally's XML-over-HTTP protocol: request
//! envelope construction and tolerant parsing of response documents into typed
//! records (companies, ledgers, vouchers). The codec is a pure transform with
//! no I/O and no retry logic; transports own delivery, the gateway owns policy.

/// Request envelope construction and escaping
mod envelope;
/// Tolerant response document scanning
mod parser;
/// Type definitions for Tally records and parse diagnostics
mod types;

pub use envelope::{RequestKind, RequestParams, XmlEnvelope, build_request, xml_escape};
pub use parser::{
    parse_companies, parse_ledgers_with_warnings, parse_vouchers_with_warnings, scan_connection,
};
pub use types::*;
