//! Quota-gated video idea generation over HTTP.
//!
//! A request is authenticated by its `x-user-id` header, checked against the
//! caller's daily quota, grounded on the caller's reference feed, sent to the
//! completion provider, and finally recorded in the usage ledger.

pub mod error;
pub mod fetch;
pub mod http;
pub mod pipeline;
pub mod quota;
pub mod store;

pub use error::{Dependency, PipelineError};
pub use fetch::{FetchFailure, ReferenceFetcher};
pub use http::{router, ErrorBody, GENERATE_PATH, IDENTITY_HEADER};
pub use pipeline::{Idea, Pipeline, PipelineConfig, Stage};
pub use quota::{QuotaDecision, QuotaGuard};
pub use store::{
    MemoryStore, PostgrestStore, RecordStore, ReferenceQuery, StoreCalls, StoreError,
};
