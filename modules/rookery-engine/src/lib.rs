//! Heterogeneous-timeline extraction and pagination engine.
//!
//! The platform's unofficial web API has no stable response schema: the
//! same timeline arrives in different JSON shapes depending on endpoint and
//! experiment cohort, and anti-automation defenses substitute an HTML
//! challenge page for the expected payload (with HTTP 200). This crate walks
//! whatever tree comes back, recovers account/post records and continuation
//! cursors, and drives cursor-based pagination with bounded retries.
//!
//! Pages are fetched strictly one at a time. Cursor pagination is inherently
//! sequential (each cursor is only known after its predecessor's response is
//! parsed), and concurrent fetching against an API that already penalizes
//! automated traffic just trips its defenses sooner.

pub mod classify;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod retry;
pub mod traits;

pub use classify::{classify, Classified};
pub use diagnostics::{DiagnosticSink, DirSink, NoopSink};
pub use driver::{EngineConfig, PageQuery, PaginationDriver};
pub use error::EngineError;
pub use extract::{extract, extract_with, EntityKind, RawMatch, ShapeKind};
pub use normalize::{normalize_account, normalize_cursor, normalize_match, normalize_post, Normalized};
pub use retry::{FetchOutcome, RetryPolicy};
pub use traits::{PageRequest, PageTransport, RawResponse, TimelineKind, TransportError};
