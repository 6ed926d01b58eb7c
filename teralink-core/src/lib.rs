pub mod access;
pub mod config;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod runloop;
pub mod selector;
pub mod transport;

pub use access::{AccessDecision, AccessGate};
pub use config::{
    load_bot_config, load_bot_config_with, BotConfig, ChannelsSection, PlayerSection,
    ResolverSection, RunLoopSection, SelectionSection, TelegramSection,
};
pub use delivery::{format_size, DeliveryBuilder, DeliveryError, DeliveryStyle};
pub use error::{ConfigError, Result};
pub use pipeline::{
    Delivery, DispatchOutcome, Dispatcher, Pipeline, PipelineError, Routes, UpdateHandler,
};
pub use resolver::{
    normalize, HttpResolver, LinkFilter, LinkResolver, MediaRecord, ResolutionClient,
    ResolutionOutcome,
};
pub use runloop::{RunLoop, RunLoopConfig, RunState};
pub use selector::{LinkSelector, SelectedLinks, SelectionPolicy};
pub use transport::{
    ActionLink, ChatRef, ChatTransport, MemberStatus, MessageRef, OutgoingMessage,
    TelegramTransport, TransportError, TransportResult, Update,
};
