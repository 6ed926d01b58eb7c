mod client;
mod normalizer;

use serde::Serialize;

pub use client::{HttpResolver, LinkFilter, LinkResolver, ResolutionClient};
pub use normalizer::{
    normalize, truncate_with_marker, FieldRule, MediaRecord, DOWNLOAD_RULES, FALLBACK_NAME,
    GENERIC_STREAM_RULES, NAME_LIMIT, NAME_RULES, QUALITY_MAP_RULES, SIZE_RULES,
};

/// Result of exactly one resolver call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Success(MediaRecord),
    NotFound,
    UpstreamError(u16),
    TransportFailure(String),
}
