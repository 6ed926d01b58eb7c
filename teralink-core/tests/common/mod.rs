#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use teralink_core::{
    normalize, AccessGate, ChatRef, ChatTransport, DeliveryBuilder, Dispatcher, LinkFilter,
    LinkResolver, LinkSelector, MemberStatus, MessageRef, OutgoingMessage, Pipeline,
    ResolutionClient, ResolutionOutcome, Routes, SelectionPolicy, TransportError,
    TransportResult, Update,
};

pub const PLAYER: &str = "https://teraplayer979.github.io/stream-player/";
pub const SOURCE: &str = "@terabox_movies_hub0";
pub const TARGET: &str = "@terabox_directlinks";
pub const JOIN_URL: &str = "https://t.me/terabox_directlinks";

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Send { chat: ChatRef, message: OutgoingMessage },
    Reply { to: MessageRef, message: OutgoingMessage },
    Edit { target: MessageRef, message: OutgoingMessage },
}

impl Sent {
    pub fn message(&self) -> &OutgoingMessage {
        match self {
            Sent::Send { message, .. } | Sent::Reply { message, .. } | Sent::Edit { message, .. } => {
                message
            }
        }
    }
}

pub enum Membership {
    Status(MemberStatus),
    LookupFails,
}

pub struct RecordingTransport {
    pub membership: Membership,
    pub fail_edits: bool,
    pub sent: Mutex<Vec<Sent>>,
    pub lookups: Mutex<Vec<(ChatRef, i64)>>,
    pub inbox: Mutex<VecDeque<Vec<Update>>>,
    next_id: Mutex<i64>,
}

impl RecordingTransport {
    pub fn new(membership: Membership) -> Self {
        Self {
            membership,
            fail_edits: false,
            sent: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            inbox: Mutex::new(VecDeque::new()),
            next_id: Mutex::new(1000),
        }
    }

    pub fn member() -> Self {
        Self::new(Membership::Status(MemberStatus::Member))
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn next_message(&self, chat_id: i64) -> MessageRef {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        MessageRef {
            chat_id,
            message_id: *next,
        }
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn clear_webhook(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn receive(&self, _offset: i64, _timeout: Duration) -> TransportResult<Vec<Update>> {
        Ok(self.inbox.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send(&self, chat: &ChatRef, message: &OutgoingMessage) -> TransportResult<MessageRef> {
        self.sent.lock().unwrap().push(Sent::Send {
            chat: chat.clone(),
            message: message.clone(),
        });
        Ok(self.next_message(-100))
    }

    async fn reply(&self, to: &MessageRef, message: &OutgoingMessage) -> TransportResult<MessageRef> {
        self.sent.lock().unwrap().push(Sent::Reply {
            to: *to,
            message: message.clone(),
        });
        Ok(self.next_message(to.chat_id))
    }

    async fn edit(&self, target: &MessageRef, message: &OutgoingMessage) -> TransportResult<()> {
        if self.fail_edits {
            return Err(TransportError::Api {
                method: "editMessageText",
                code: Some(400),
                description: "Bad Request: message is too long".into(),
            });
        }
        self.sent.lock().unwrap().push(Sent::Edit {
            target: *target,
            message: message.clone(),
        });
        Ok(())
    }

    async fn member_status(&self, chat: &ChatRef, user_id: i64) -> TransportResult<MemberStatus> {
        self.lookups.lock().unwrap().push((chat.clone(), user_id));
        match &self.membership {
            Membership::Status(status) => Ok(status.clone()),
            Membership::LookupFails => Err(TransportError::Api {
                method: "getChatMember",
                code: Some(400),
                description: "Bad Request: member list is inaccessible".into(),
            }),
        }
    }
}

pub struct StubResolver {
    outcome: ResolutionOutcome,
    pub calls: Mutex<Vec<String>>,
}

impl StubResolver {
    pub fn new(outcome: ResolutionOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json(document: Value) -> Self {
        Self::new(normalize(&document))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkResolver for StubResolver {
    async fn resolve(&self, link: &str) -> ResolutionOutcome {
        self.calls.lock().unwrap().push(link.to_string());
        self.outcome.clone()
    }
}

pub fn movie_document() -> Value {
    json!({
        "list": [{
            "name": "Movie.mkv",
            "fast_stream_url": {"720p": "https://x/720.m3u8"},
            "download_link": "https://x/dl"
        }]
    })
}

pub fn dispatcher(
    transport: Arc<RecordingTransport>,
    resolver: Arc<StubResolver>,
    policy: SelectionPolicy,
) -> Dispatcher {
    let pipeline = Pipeline::new(
        ResolutionClient::new(LinkFilter::new(["terabox", "1024tera"]), resolver),
        LinkSelector::new(policy, ".m3u8"),
        DeliveryBuilder::new(PLAYER),
    );
    Dispatcher::new(
        transport,
        pipeline,
        AccessGate::new(ChatRef::parse(TARGET), JOIN_URL),
        Routes {
            source: ChatRef::parse(SOURCE),
            target: ChatRef::parse(TARGET),
        },
    )
}

pub fn private_update(update_id: i64, user_id: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": {
            "message_id": 10,
            "chat": {"id": user_id, "type": "private"},
            "from": {"id": user_id},
            "text": text
        }
    }))
    .unwrap()
}

pub fn group_update(update_id: i64, username: &str, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": {
            "message_id": 20,
            "chat": {"id": -1001, "type": "supergroup", "username": username},
            "from": {"id": 77},
            "text": text
        }
    }))
    .unwrap()
}

pub fn actions(message: &OutgoingMessage) -> Vec<(String, String)> {
    message
        .actions
        .iter()
        .map(|action| (action.label.clone(), action.url.clone()))
        .collect()
}
