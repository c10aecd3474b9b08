//! Chat message envelopes and the pub/sub bus abstraction.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{BusError, MessageBus, Subscription};
pub use envelope::{Author, IncomingMessage, OutgoingMessage, ReplyTarget};
pub use in_memory_bus::InMemoryMessageBus;
