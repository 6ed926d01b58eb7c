use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::pipeline::UpdateHandler;
use crate::transport::ChatTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Starting,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLoopConfig {
    /// Pause after clearing the webhook, lets a redeploying host settle.
    pub settle: Duration,
    /// Pause after a failed receive before starting over.
    pub cooldown: Duration,
    pub poll_timeout: Duration,
}

impl RunLoopConfig {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            settle: Duration::from_secs(config.run_loop.settle_seconds),
            cooldown: Duration::from_secs(config.run_loop.cooldown_seconds),
            poll_timeout: config.telegram.poll_timeout(),
        }
    }
}

/// Process lifecycle: `Starting` clears stale transport state, `Polling`
/// receives and dispatches one update at a time. A failed receive falls back
/// to `Starting` after the cooldown.
pub struct RunLoop {
    transport: Arc<dyn ChatTransport>,
    handler: Arc<dyn UpdateHandler>,
    config: RunLoopConfig,
    state: RunState,
    offset: i64,
}

impl RunLoop {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        handler: Arc<dyn UpdateHandler>,
        config: RunLoopConfig,
    ) -> Self {
        Self {
            transport,
            handler,
            config,
            state: RunState::Starting,
            offset: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Next update id the transport is asked for.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Performs exactly one state transition.
    pub async fn step(&mut self) -> RunState {
        self.state = match self.state {
            RunState::Starting => self.start().await,
            RunState::Polling => self.poll().await,
        };
        self.state
    }

    /// Runs until the process is terminated.
    pub async fn run(mut self) {
        info!("bot starting");
        loop {
            self.step().await;
        }
    }

    async fn start(&mut self) -> RunState {
        if let Err(err) = self.transport.clear_webhook().await {
            warn!(error = %err, "could not clear webhook registration");
        }
        sleep(self.config.settle).await;
        info!(offset = self.offset, "polling");
        RunState::Polling
    }

    async fn poll(&mut self) -> RunState {
        match self
            .transport
            .receive(self.offset, self.config.poll_timeout)
            .await
        {
            Ok(updates) => {
                for update in updates {
                    self.offset = self.offset.max(update.update_id + 1);
                    let outcome = self.handler.handle(&update).await;
                    debug!(update_id = update.update_id, outcome = ?outcome, "update handled");
                }
                RunState::Polling
            }
            Err(err) => {
                error!(
                    error = %err,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "polling crashed, restarting after cooldown"
                );
                sleep(self.config.cooldown).await;
                RunState::Starting
            }
        }
    }
}
