//! Messenger Page webhook relay: verifies the webhook subscription, routes
//! user messages to AI and media services, and sends the answers back as
//! ordered, size-limited messages.

pub mod channels;
pub mod chunker;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod util;

pub use config::Config;
