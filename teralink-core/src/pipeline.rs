use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::access::AccessGate;
use crate::config::BotConfig;
use crate::delivery::{DeliveryBuilder, DeliveryError, DeliveryStyle};
use crate::resolver::{MediaRecord, ResolutionClient, ResolutionOutcome};
use crate::selector::{LinkSelector, SelectedLinks};
use crate::transport::{
    ChatKind, ChatRef, ChatTransport, IncomingMessage, MessageRef, OutgoingMessage, Update,
};

pub const PROGRESS_TEXT: &str = "⏳ Generating links...";
pub const WELCOME_TEXT: &str =
    "👋 Send me a TeraBox link and I will reply with an online player and a direct download.";
pub const JOIN_LABEL: &str = "Join Channel";

/// Every way a single request can fail. None of these reach the run loop.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("no recognised link in input")]
    InputRejected,
    #[error("resolver found no usable link")]
    NotFound,
    #[error("resolver returned status {status}")]
    UpstreamError { status: u16 },
    #[error("resolver unreachable: {0}")]
    TransportFailure(String),
    #[error("requester is not a channel member")]
    AccessDenied,
    #[error("no link playable under the selection policy")]
    NoPlayableLink,
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

impl PipelineError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::InputRejected => "⚠️ Please send a valid TeraBox link.",
            PipelineError::NotFound => "❌ Failed to fetch data. Link might be invalid.",
            PipelineError::UpstreamError { .. } => {
                "⚠️ The link service returned an error. Please try again later."
            }
            PipelineError::TransportFailure(_) => {
                "⌛ The link service is not responding right now. Please try again later."
            }
            PipelineError::AccessDenied => {
                "🚫 Access Denied\n\nYou must join our channel to use this bot."
            }
            PipelineError::NoPlayableLink => "❌ No playable stream found.",
            PipelineError::DeliveryFailed(_) => "❌ Could not deliver the result.",
        }
    }
}

/// Everything produced for one resolved link.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub link: String,
    pub record: MediaRecord,
    pub links: SelectedLinks,
    pub message: OutgoingMessage,
}

/// Transport-free part of request handling: resolve, select, build.
#[derive(Clone)]
pub struct Pipeline {
    client: ResolutionClient,
    selector: LinkSelector,
    builder: DeliveryBuilder,
}

impl Pipeline {
    pub fn new(client: ResolutionClient, selector: LinkSelector, builder: DeliveryBuilder) -> Self {
        Self {
            client,
            selector,
            builder,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            ResolutionClient::from_config(&config.resolver),
            LinkSelector::new(config.selection.policy, &config.selection.streaming_marker),
            DeliveryBuilder::new(&config.player.base_url),
        )
    }

    pub fn accept(&self, text: &str) -> Option<String> {
        self.client.accept(text)
    }

    pub async fn run(&self, link: &str, style: DeliveryStyle) -> Result<Delivery, PipelineError> {
        let record = match self.client.resolve(link).await {
            ResolutionOutcome::Success(record) => record,
            ResolutionOutcome::NotFound => return Err(PipelineError::NotFound),
            ResolutionOutcome::UpstreamError(status) => {
                return Err(PipelineError::UpstreamError { status })
            }
            ResolutionOutcome::TransportFailure(cause) => {
                return Err(PipelineError::TransportFailure(cause))
            }
        };
        let links = self.selector.select(&record);
        let message = self
            .builder
            .build(&links, record.size_bytes, style)
            .map_err(|_: DeliveryError| PipelineError::NoPlayableLink)?;
        Ok(Delivery {
            link: link.to_string(),
            record,
            links,
            message,
        })
    }
}

/// Where monitored links come from and where they are published.
#[derive(Debug, Clone)]
pub struct Routes {
    pub source: ChatRef,
    pub target: ChatRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored,
    Welcomed,
    Delivered,
    Failed(PipelineError),
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: &Update) -> DispatchOutcome;
}

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    pipeline: Pipeline,
    gate: AccessGate,
    routes: Routes,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        pipeline: Pipeline,
        gate: AccessGate,
        routes: Routes,
    ) -> Self {
        Self {
            transport,
            pipeline,
            gate,
            routes,
        }
    }

    pub fn from_config(config: &BotConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self::new(
            transport,
            Pipeline::from_config(config),
            AccessGate::from_config(&config.channels),
            Routes {
                source: ChatRef::parse(&config.channels.source),
                target: ChatRef::parse(&config.channels.target),
            },
        )
    }

    pub async fn dispatch(&self, update: &Update) -> DispatchOutcome {
        let Some(message) = update.payload() else {
            return DispatchOutcome::Ignored;
        };
        match message.chat.kind {
            ChatKind::Group | ChatKind::Supergroup | ChatKind::Channel
                if self.routes.source.matches(&message.chat) =>
            {
                self.handle_monitored(message).await
            }
            ChatKind::Private => self.handle_private(message).await,
            _ => DispatchOutcome::Ignored,
        }
    }

    async fn handle_monitored(&self, message: &IncomingMessage) -> DispatchOutcome {
        let Some(link) = message.content().and_then(|text| self.pipeline.accept(text)) else {
            return DispatchOutcome::Ignored;
        };
        info!(source = %self.routes.source, link = %link, "monitored link received");

        let delivery = match self.pipeline.run(&link, DeliveryStyle::ChannelPost).await {
            Ok(delivery) => delivery,
            Err(err) => {
                warn!(link = %link, error = %err, "monitored link not published");
                return DispatchOutcome::Failed(err);
            }
        };
        match self.transport.send(&self.routes.target, &delivery.message).await {
            Ok(_) => {
                info!(channel = %self.routes.target, name = %delivery.links.display_name, "published to channel");
                DispatchOutcome::Delivered
            }
            Err(err) => {
                error!(channel = %self.routes.target, error = %err, "post to channel failed");
                DispatchOutcome::Failed(PipelineError::DeliveryFailed(err.to_string()))
            }
        }
    }

    async fn handle_private(&self, message: &IncomingMessage) -> DispatchOutcome {
        let Some(text) = message.content() else {
            return DispatchOutcome::Ignored;
        };
        let origin = message.reference();
        // in a private chat the chat id is the user id
        let user_id = message.from.as_ref().map_or(message.chat.id, |user| user.id);

        let decision = self.gate.check(self.transport.as_ref(), user_id).await;
        if !decision.allowed {
            let mut notice = OutgoingMessage::text(PipelineError::AccessDenied.user_message());
            if let Some(join_url) = decision.join_url {
                notice = notice.with_action(JOIN_LABEL, join_url);
            }
            self.reply_best_effort(&origin, &notice).await;
            return DispatchOutcome::Failed(PipelineError::AccessDenied);
        }

        if is_start_command(text) {
            self.reply_best_effort(&origin, &OutgoingMessage::text(WELCOME_TEXT))
                .await;
            return DispatchOutcome::Welcomed;
        }

        let Some(link) = self.pipeline.accept(text) else {
            let notice = OutgoingMessage::text(PipelineError::InputRejected.user_message());
            self.reply_best_effort(&origin, &notice).await;
            return DispatchOutcome::Failed(PipelineError::InputRejected);
        };

        let progress = match self
            .transport
            .reply(&origin, &OutgoingMessage::text(PROGRESS_TEXT))
            .await
        {
            Ok(progress) => progress,
            Err(err) => {
                error!(chat_id = origin.chat_id, error = %err, "progress reply failed");
                return DispatchOutcome::Failed(PipelineError::DeliveryFailed(err.to_string()));
            }
        };

        let (reply, outcome) = match self.pipeline.run(&link, DeliveryStyle::Reply).await {
            Ok(delivery) => (delivery.message, DispatchOutcome::Delivered),
            Err(err) => {
                warn!(user_id, link = %link, error = %err, "private request failed");
                (
                    OutgoingMessage::text(err.user_message()),
                    DispatchOutcome::Failed(err),
                )
            }
        };
        if let Err(err) = self.transport.edit(&progress, &reply).await {
            error!(chat_id = origin.chat_id, error = %err, "result edit failed");
            return DispatchOutcome::Failed(PipelineError::DeliveryFailed(err.to_string()));
        }
        outcome
    }

    async fn reply_best_effort(&self, origin: &MessageRef, message: &OutgoingMessage) {
        if let Err(err) = self.transport.reply(origin, message).await {
            error!(chat_id = origin.chat_id, error = %err, "reply failed");
        }
    }
}

#[async_trait]
impl UpdateHandler for Dispatcher {
    async fn handle(&self, update: &Update) -> DispatchOutcome {
        self.dispatch(update).await
    }
}

fn is_start_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .and_then(|command| command.split('@').next())
        .is_some_and(|command| command == "/start" || command == "/help")
}
