//! AI narrative collaborator: request/response types, the HTTP client, and
//! conversion of free-form answers into display items.

pub mod client;
pub mod digest;
pub mod reconstruct;

pub use client::{
    AiSummary, HttpSummaryClient, Recommendations, SummaryBackend, SummaryError, SummaryGateway,
    SummaryRequest,
};
pub use digest::{DigestSource, SummaryDigest, ANALYSIS_UNAVAILABLE};
pub use reconstruct::{split_into_items, ItemHeader};
