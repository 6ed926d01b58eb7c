use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ChannelsSection;
use crate::transport::{ChatRef, ChatTransport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub join_url: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            join_url: None,
        }
    }

    fn deny(join_url: &str) -> Self {
        Self {
            allowed: false,
            join_url: Some(join_url.to_string()),
        }
    }
}

/// Channel-membership check for private requests. Fails closed and never caches.
#[derive(Debug, Clone)]
pub struct AccessGate {
    channel: ChatRef,
    join_url: String,
}

impl AccessGate {
    pub fn new(channel: ChatRef, join_url: impl Into<String>) -> Self {
        Self {
            channel,
            join_url: join_url.into(),
        }
    }

    pub fn from_config(section: &ChannelsSection) -> Self {
        Self::new(ChatRef::parse(&section.auth_channel), &section.join_url)
    }

    pub async fn check(&self, transport: &dyn ChatTransport, user_id: i64) -> AccessDecision {
        match transport.member_status(&self.channel, user_id).await {
            Ok(status) if status.grants_access() => AccessDecision::allow(),
            Ok(status) => {
                debug!(user_id, status = ?status, channel = %self.channel, "membership not sufficient");
                AccessDecision::deny(&self.join_url)
            }
            Err(err) => {
                warn!(user_id, channel = %self.channel, error = %err, "membership lookup failed");
                AccessDecision::deny(&self.join_url)
            }
        }
    }
}
