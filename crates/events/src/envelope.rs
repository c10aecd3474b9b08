//! Chat gateway message envelopes.
//!
//! The gateway serializes every chat message it sees as JSON onto the inbound topic and
//! relays JSON replies from the outbound topic. Only the fields the game needs are
//! modelled; unknown fields are ignored on decode.

use serde::{Deserialize, Serialize};

use dbtc_core::UserId;

/// Author of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
}

/// A chat message received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Gateway-native message id.
    #[serde(default)]
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    pub author: Author,
    pub content: String,
}

impl IncomingMessage {
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        author: Author,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            thread_id: None,
            guild_id: None,
            author,
            content: content.into(),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Where replies to this message should be delivered.
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget {
            channel_id: self.channel_id.clone(),
            thread_id: self.thread_id.clone(),
            message_id: self.id.clone(),
        }
    }

    /// Build a reply in the same channel, or in the thread the message came from.
    pub fn respond(
        &self,
        source_app: &str,
        content: impl Into<String>,
        as_reply: bool,
        new_thread: bool,
    ) -> OutgoingMessage {
        self.reply_target().respond(source_app, content, as_reply, new_thread)
    }
}

/// Destination captured from an inbound message, kept around for later replies
/// (e.g. job completion notices long after the command was handled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub message_id: String,
}

impl ReplyTarget {
    pub fn respond(
        &self,
        source_app: &str,
        content: impl Into<String>,
        as_reply: bool,
        new_thread: bool,
    ) -> OutgoingMessage {
        OutgoingMessage {
            source_app: source_app.to_string(),
            channel_id: self.channel_id.clone(),
            thread_id: self.thread_id.clone(),
            content: content.into(),
            reply_to: (as_reply && !self.message_id.is_empty()).then(|| self.message_id.clone()),
            new_thread,
        }
    }
}

/// A reply to be relayed to the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub source_app: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub content: String,
    /// Message id to reply to, when sent as a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub new_thread: bool,
}

impl OutgoingMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
