use serde::{Deserialize, Serialize};

use crate::resolver::{truncate_with_marker, MediaRecord, NAME_LIMIT};

/// Quality labels tried first, in order.
pub const QUALITY_PRIORITY: &[&str] = &["720p", "480p", "360p"];

/// Whether a plain download link may stand in for the player link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    Permissive,
    StreamingOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedLinks {
    pub watch_url: Option<String>,
    pub download_url: Option<String>,
    pub display_name: String,
}

impl SelectedLinks {
    pub fn is_empty(&self) -> bool {
        self.watch_url.is_none() && self.download_url.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct LinkSelector {
    policy: SelectionPolicy,
    streaming_marker: String,
}

impl LinkSelector {
    pub fn new(policy: SelectionPolicy, streaming_marker: impl Into<String>) -> Self {
        Self {
            policy,
            streaming_marker: streaming_marker.into().to_ascii_lowercase(),
        }
    }

    pub fn select(&self, record: &MediaRecord) -> SelectedLinks {
        let watch_url = watch_candidates(record)
            .into_iter()
            .find(|url| self.may_watch(url))
            .map(str::to_string);
        let watch_url = match self.policy {
            SelectionPolicy::Permissive => watch_url.or_else(|| record.download_url.clone()),
            SelectionPolicy::StreamingOnly => watch_url,
        };
        SelectedLinks {
            watch_url,
            download_url: record.download_url.clone(),
            display_name: truncate_with_marker(&record.name, NAME_LIMIT),
        }
    }

    fn may_watch(&self, url: &str) -> bool {
        match self.policy {
            SelectionPolicy::Permissive => true,
            SelectionPolicy::StreamingOnly => url
                .to_ascii_lowercase()
                .contains(self.streaming_marker.as_str()),
        }
    }
}

/// Stream URLs in watch priority: the fixed labels, any other labels from
/// highest resolution down, then the generic stream.
fn watch_candidates(record: &MediaRecord) -> Vec<&str> {
    let mut ordered: Vec<&str> = QUALITY_PRIORITY
        .iter()
        .filter_map(|label| record.stream_candidates.get(*label))
        .map(String::as_str)
        .collect();

    let mut others: Vec<(u32, &str)> = record
        .stream_candidates
        .iter()
        .filter(|(label, _)| !QUALITY_PRIORITY.iter().any(|known| *known == label.as_str()))
        .map(|(label, url)| (resolution(label), url.as_str()))
        .collect();
    // stable sort keeps the first encountered on equal resolution
    others.sort_by(|a, b| b.0.cmp(&a.0));
    ordered.extend(others.into_iter().map(|(_, url)| url));

    ordered.extend(record.generic_stream_url.as_deref());
    ordered
}

fn resolution(label: &str) -> u32 {
    let digits: String = label.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
