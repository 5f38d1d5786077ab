//! Demo bot: `/rem <text>` stores a note per user, `/list` replies with the
//! stored notes, anything else is echoed back (stickers get a sticker).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botloop::config::Config;
use botloop::dispatch::Dispatcher;
use botloop::handlers::{BotHandlers, CommandCall, CommandHandler, MessageHandler};
use botloop::pipeline::SendPipeline;
use botloop::polling::PollingBot;
use botloop::request::{OutboundMessage, RequestFactory, SendMessage, SendSticker};
use botloop::transport::HttpTransport;
use botloop::update::Update;
use botloop::webhook::WebhookBot;

const STICKER_ID: &str = "BQADAgADQAADyIsGAAGMQCvHaYLU_AI";

/// Per-user note storage shared between the two command handlers.
struct UsersMemory {
    memorized: Mutex<HashMap<i64, Vec<String>>>,
}

struct RememberCommand {
    users: Arc<UsersMemory>,
    factory: RequestFactory,
}

#[async_trait]
impl CommandHandler for RememberCommand {
    async fn handle(&self, call: CommandCall) -> Result<Vec<OutboundMessage>> {
        let message = call.update.message().context("update carries no message")?;
        let from = message.from.as_ref().context("message has no sender")?;
        let chat = message.chat.as_ref().context("message has no chat")?;
        if call.argument.is_empty() {
            return Ok(vec![self.factory.send_message(&SendMessage::new(
                chat.id,
                "I can't find arguments for command.",
            ))?]);
        }
        let mut memorized = self.users.memorized.lock().await;
        memorized
            .entry(from.id)
            .or_default()
            .push(call.argument.clone());
        Ok(vec![self
            .factory
            .send_message(&SendMessage::new(chat.id, "Will remember that :)"))?])
    }
}

struct ListCommand {
    users: Arc<UsersMemory>,
    factory: RequestFactory,
}

#[async_trait]
impl CommandHandler for ListCommand {
    async fn handle(&self, call: CommandCall) -> Result<Vec<OutboundMessage>> {
        let message = call.update.message().context("update carries no message")?;
        let from = message.from.as_ref().context("message has no sender")?;
        let chat = message.chat.as_ref().context("message has no chat")?;
        let memorized = self.users.memorized.lock().await;
        let text = match memorized.get(&from.id) {
            Some(notes) => notes.join("\n"),
            None => "I have no history for you, sorry :(".to_string(),
        };
        Ok(vec![self
            .factory
            .send_message(&SendMessage::new(chat.id, text))?])
    }
}

struct EchoHandler {
    factory: RequestFactory,
}

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, update: Update) -> Result<Vec<OutboundMessage>> {
        let message = update.message().context("update carries no message")?;
        let chat = message.chat.as_ref().context("message has no chat")?;
        if message.sticker.is_some() {
            return Ok(vec![self
                .factory
                .send_sticker(&SendSticker::new(chat.id, STICKER_ID))?]);
        }
        Ok(vec![self
            .factory
            .send_message(&SendMessage::new(chat.id, format!("ECHO:\n{}", message.text)))?])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,botloop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let factory = RequestFactory::with_api_root(&config.telegram.api_root, &config.telegram.bot_token);
    let transport = Arc::new(HttpTransport::new());
    let pipeline = SendPipeline::new(transport.clone());

    let users = Arc::new(UsersMemory {
        memorized: Mutex::new(HashMap::new()),
    });
    let mut handlers = BotHandlers::new(Arc::new(EchoHandler {
        factory: factory.clone(),
    }));
    handlers.register_command(
        "/rem",
        Arc::new(RememberCommand {
            users: users.clone(),
            factory: factory.clone(),
        }),
    )?;
    handlers.register_command(
        "/list",
        Arc::new(ListCommand {
            users,
            factory: factory.clone(),
        }),
    )?;
    let processor = Arc::new(Dispatcher::new(factory.clone(), handlers, pipeline));

    match &config.webhook {
        Some(section) => {
            let webhook_config = section.to_webhook_config()?;
            let bot = WebhookBot::subscribe_and_bind(
                &factory,
                transport,
                processor,
                &webhook_config,
            )
            .await?;
            info!("Bot started in webhook mode.");
            bot.serve().await?;
        }
        None => {
            let bot = PollingBot::spawn(factory, transport, processor, config.poll_period());
            info!("Bot started in polling mode. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            bot.stop();
            bot.join().await;
        }
    }

    Ok(())
}
