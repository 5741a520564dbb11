//! Transport sources for Tally data
//!
//! One client per backend: the local proxy speaking raw XML (`direct`), the
//! cloud-to-local relay (`bridge`), and the server-side snapshot (`backup`).
//! Route selection between them is pure policy in `selector`; the gateway owns
//! retries and fallback on top of these clients.

/// Server-side snapshot endpoints
mod backup;
/// Relay endpoints keyed by pairing token
mod bridge;
/// Local proxy speaking Tally's XML protocol
mod direct;
/// Pure transport selection policy
mod selector;
/// Error taxonomy and shared response handling
mod types;

pub use backup::{BackupSource, MAX_UPLOAD_BYTES, upload_timeout};
pub use bridge::BridgeSource;
pub use direct::DirectSource;
pub use selector::{Operation, Route, select_route};
pub(crate) use types::check_response;
pub use types::{BridgeInfo, SourceError, UploadReceipt};
