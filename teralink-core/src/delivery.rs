use serde::Serialize;
use thiserror::Error;
use url::form_urlencoded;

use crate::resolver::{truncate_with_marker, NAME_LIMIT};
use crate::selector::SelectedLinks;
use crate::transport::OutgoingMessage;

/// Ceiling kept below the transport's 4096 character message limit.
pub const TEXT_LIMIT: usize = 4000;
pub const WATCH_LABEL: &str = "Watch Online";
pub const DOWNLOAD_LABEL: &str = "Download";
pub const DEGRADED_NOTE: &str = "ℹ️ Online playback is not available for this file, use Download.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("nothing to deliver: no watch or download link")]
    NothingToDeliver,
}

/// Private replies and channel publications use different summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStyle {
    Reply,
    ChannelPost,
}

#[derive(Debug, Clone)]
pub struct DeliveryBuilder {
    player_base: String,
}

impl DeliveryBuilder {
    pub fn new(player_base: impl Into<String>) -> Self {
        Self {
            player_base: player_base.into(),
        }
    }

    /// Player page URL carrying `watch_url` as a single encoded `url` parameter.
    pub fn player_link(&self, watch_url: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(watch_url.as_bytes()).collect();
        let separator = if self.player_base.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{separator}url={encoded}", self.player_base)
    }

    pub fn build(
        &self,
        links: &SelectedLinks,
        size_bytes: Option<u64>,
        style: DeliveryStyle,
    ) -> Result<OutgoingMessage, DeliveryError> {
        if links.is_empty() {
            return Err(DeliveryError::NothingToDeliver);
        }

        let name = truncate_with_marker(&links.display_name, NAME_LIMIT);
        let mut lines = match style {
            DeliveryStyle::Reply => vec!["✅ Ready!".to_string(), String::new(), format!("📦 {name}")],
            DeliveryStyle::ChannelPost => vec![format!("🎬 {name}")],
        };
        if let Some(size) = size_bytes {
            lines.push(format!("💾 Size: {}", format_size(size)));
        }
        if links.watch_url.is_none() {
            lines.push(String::new());
            lines.push(DEGRADED_NOTE.to_string());
        }

        let mut message = OutgoingMessage::text(truncate_with_marker(&lines.join("\n"), TEXT_LIMIT));
        if let Some(watch) = &links.watch_url {
            message = message.with_action(WATCH_LABEL, self.player_link(watch));
        }
        if let Some(download) = &links.download_url {
            message = message.with_action(DOWNLOAD_LABEL, download.as_str());
        }
        Ok(message)
    }
}

/// Human readable binary size, e.g. `1.50 GB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
