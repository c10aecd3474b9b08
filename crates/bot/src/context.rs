use dbtc_core::UserId;
use dbtc_events::{IncomingMessage, OutgoingMessage, ReplyTarget};

/// A chat message that parsed as a command.
///
/// Immutable; handlers only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    message: IncomingMessage,
    keyword: String,
    args: Vec<String>,
}

impl CommandContext {
    /// Tokenize on whitespace. `None` if the first token does not start with `prefix`
    /// or is the bare prefix.
    pub fn parse(message: IncomingMessage, prefix: &str) -> Option<Self> {
        let mut tokens = message.content.split_whitespace();
        let keyword = tokens.next()?.strip_prefix(prefix)?;
        if keyword.is_empty() {
            return None;
        }
        let keyword = keyword.to_string();
        let args = tokens.map(str::to_string).collect();

        Some(Self {
            message,
            keyword,
            args,
        })
    }

    pub fn user(&self) -> &UserId {
        &self.message.author.id
    }

    /// Command keyword without the prefix, e.g. `jobs`.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn reply_target(&self) -> ReplyTarget {
        self.message.reply_target()
    }

    /// A reply to this command in its channel/thread.
    pub fn reply(&self, source_app: &str, content: impl Into<String>) -> OutgoingMessage {
        self.message.respond(source_app, content, true, false)
    }
}
