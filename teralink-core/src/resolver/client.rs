use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ResolverSection;

use super::normalizer::normalize;
use super::ResolutionOutcome;

const TRIMMED_PUNCTUATION: &[char] = &[
    '<', '>', '(', ')', '[', ']', '{', '}', '"', '\'', ',', ';', '!', '.',
];

/// Local pre-filter: only links on a recognised host ever reach the resolver.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    markers: Vec<String>,
}

impl LinkFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|marker| marker.as_ref().trim().to_ascii_lowercase())
            .filter(|marker| !marker.is_empty())
            .collect();
        Self { markers }
    }

    /// Returns the first token of `text` that is a link on a recognised host.
    pub fn extract(&self, text: &str) -> Option<String> {
        text.split_whitespace()
            .map(|token| token.trim_matches(TRIMMED_PUNCTUATION))
            .filter(|token| !token.is_empty())
            .find_map(|token| self.accept_token(token))
    }

    fn accept_token(&self, token: &str) -> Option<String> {
        let lower = token.to_ascii_lowercase();
        if !self.markers.iter().any(|marker| lower.contains(marker.as_str())) {
            return None;
        }
        let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
            token.to_string()
        } else {
            format!("https://{token}")
        };
        let parsed = Url::parse(&candidate).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let on_known_host =
            host.contains('.') && self.markers.iter().any(|marker| host.contains(marker.as_str()));
        on_known_host.then_some(candidate)
    }
}

#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, link: &str) -> ResolutionOutcome;
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    url: &'a str,
}

/// Resolver backed by the extraction service's HTTP API.
pub struct HttpResolver {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_key_header: String,
    timeout: Duration,
}

impl HttpResolver {
    pub fn new(section: &ResolverSection) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: section.endpoint.clone(),
            api_key: section.api_key.clone(),
            api_key_header: section.api_key_header.clone(),
            timeout: section.timeout(),
        }
    }
}

#[async_trait]
impl LinkResolver for HttpResolver {
    async fn resolve(&self, link: &str) -> ResolutionOutcome {
        let request = self
            .client
            .post(&self.endpoint)
            .header(self.api_key_header.as_str(), self.api_key.as_str())
            .timeout(self.timeout)
            .json(&ResolveRequest { url: link });

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, timeout = err.is_timeout(), "resolver request failed");
                return ResolutionOutcome::TransportFailure(err.to_string());
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "resolver returned non-success status");
            return ResolutionOutcome::UpstreamError(status.as_u16());
        }

        match response.json::<Value>().await {
            Ok(document) => normalize(&document),
            Err(err) => {
                warn!(error = %err, "resolver body could not be decoded");
                ResolutionOutcome::TransportFailure(err.to_string())
            }
        }
    }
}

/// Pre-filter plus resolver, shared by both delivery paths.
#[derive(Clone)]
pub struct ResolutionClient {
    filter: LinkFilter,
    resolver: Arc<dyn LinkResolver>,
}

impl ResolutionClient {
    pub fn new(filter: LinkFilter, resolver: Arc<dyn LinkResolver>) -> Self {
        Self { filter, resolver }
    }

    pub fn from_config(section: &ResolverSection) -> Self {
        Self::new(
            LinkFilter::new(&section.domain_markers),
            Arc::new(HttpResolver::new(section)),
        )
    }

    /// Extracts a resolvable link from free text without touching the network.
    pub fn accept(&self, text: &str) -> Option<String> {
        self.filter.extract(text)
    }

    pub async fn resolve(&self, link: &str) -> ResolutionOutcome {
        info!(link = %link, "resolving link");
        let outcome = self.resolver.resolve(link).await;
        debug!(link = %link, outcome = ?outcome, "resolver finished");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> LinkFilter {
        LinkFilter::new(["terabox", "1024tera"])
    }

    #[test]
    fn extracts_link_embedded_in_text() {
        assert_eq!(
            filter().extract("check this https://terabox.com/s/abc"),
            Some("https://terabox.com/s/abc".to_string())
        );
    }

    #[test]
    fn adds_scheme_and_strips_punctuation() {
        assert_eq!(
            filter().extract("(www.1024TERA.com/s/1xyz)."),
            Some("https://www.1024TERA.com/s/1xyz".to_string())
        );
    }

    #[test]
    fn rejects_text_without_known_host() {
        let filter = filter();
        assert_eq!(filter.extract("hello"), None);
        assert_eq!(filter.extract("i love terabox"), None);
        assert_eq!(filter.extract("https://example.com/?ref=terabox"), None);
        assert_eq!(filter.extract(""), None);
    }

    #[test]
    fn blank_markers_are_ignored() {
        let filter = LinkFilter::new(["", "  "]);
        assert_eq!(filter.extract("https://terabox.com/s/abc"), None);
    }
}
