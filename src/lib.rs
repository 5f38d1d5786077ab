//! Update ingestion and dispatch engine for Telegram bots.
//!
//! Updates arrive either through a background long-poll loop
//! ([`polling::PollingBot`]) or a pushed webhook callback
//! ([`webhook::WebhookBot`]); both feed the same [`dispatch::Dispatcher`],
//! which routes each update to a registered command or message handler and
//! fans the handler's outbound messages into the [`pipeline::SendPipeline`].
//! Handler failures turn into a best-effort user-facing notification and
//! never take down the acquisition loop.

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod markup;
pub mod pipeline;
pub mod polling;
pub mod request;
pub mod transport;
pub mod update;
pub mod webhook;

pub use config::Config;
pub use dispatch::{Dispatcher, UpdateProcessor};
pub use handlers::{BotHandlers, CommandCall, CommandHandler, MessageHandler};
pub use pipeline::SendPipeline;
pub use polling::PollingBot;
pub use request::{OutboundMessage, RequestFactory, SendMessage};
pub use transport::{HttpTransport, Transport};
pub use update::{SendResult, Update, UpdatePayload};
pub use webhook::{WebhookBot, WebhookConfig};
