//! Messaging transport: the `Channel` trait, outbound payloads, and the
//! Messenger Platform implementation with its webhook payload model.

pub mod messenger;
pub mod traits;

pub use messenger::{MessengerChannel, WebhookPayload, PAGE_OBJECT};
pub use traits::{AttachmentKind, Channel, InboundEvent, InboundKind, Payload, SendMessage};

#[cfg(test)]
pub(crate) mod testing;
