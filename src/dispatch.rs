use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::handlers::{BotHandlers, CommandCall};
use crate::pipeline::SendPipeline;
use crate::request::{AnswerCallbackQuery, OutboundMessage, RequestFactory, SendMessage};
use crate::update::{EntityKind, Message, Update, UpdatePayload};

/// Shared by both acquisition strategies: everything that happens to one
/// decoded update.
#[async_trait]
pub trait UpdateProcessor: Send + Sync {
    async fn process(&self, update: &Update) -> Result<()>;
}

/// Resolve the first bot-command entity of a message into a command name and
/// its argument text (the rest of the message, trimmed). Entities with
/// offsets that do not land on the text are skipped.
fn parse_command(message: &Message) -> Option<(String, String)> {
    for entity in &message.entities {
        if entity.kind != EntityKind::BotCommand {
            continue;
        }
        let Some(end) = entity.offset.checked_add(entity.length) else {
            continue;
        };
        let Some(name) = message.text.get(entity.offset..end) else {
            continue;
        };
        let argument = message
            .text
            .get(end..)
            .map(|rest| rest.trim().to_string())
            .unwrap_or_default();
        return Some((name.to_string(), argument));
    }
    None
}

/// Routes each update to the registered handler and fans the handler's
/// messages out to the send pipeline. Handler errors become a best-effort
/// user-facing notification instead of propagating.
pub struct Dispatcher {
    factory: RequestFactory,
    handlers: BotHandlers,
    pipeline: SendPipeline,
}

impl Dispatcher {
    pub fn new(factory: RequestFactory, handlers: BotHandlers, pipeline: SendPipeline) -> Self {
        Self {
            factory,
            handlers,
            pipeline,
        }
    }

    async fn route(&self, update: &Update) -> Result<Vec<OutboundMessage>> {
        if let UpdatePayload::CallbackQuery(query) = &update.payload {
            // The callback data names the originating command.
            let call = CommandCall {
                argument: String::new(),
                update: update.clone(),
            };
            return self.handlers.on_command(&query.data, call).await;
        }
        let Some(message) = update.message() else {
            return self.handlers.on_message(update.clone()).await;
        };
        match parse_command(message) {
            Some((name, argument)) => {
                debug!(command = %name, "dispatching command");
                let call = CommandCall {
                    argument,
                    update: update.clone(),
                };
                self.handlers.on_command(&name, call).await
            }
            None => self.handlers.on_message(update.clone()).await,
        }
    }

    /// Tell the user their request failed. Succeeding here resolves the
    /// update; failing here is the update's overall failure, chained with the
    /// handler error.
    async fn notify_handler_error(&self, update: &Update, cause: anyhow::Error) -> Result<()> {
        let mut notifications = Vec::new();
        if let Some(chat_id) = update.chat_id() {
            let apology = SendMessage::new(chat_id, format!("Internal error: {cause:#}"));
            notifications.push(self.factory.send_message(&apology)?);
        }
        if let UpdatePayload::CallbackQuery(query) = &update.payload {
            notifications.push(self.factory.answer_callback_query(&AnswerCallbackQuery {
                callback_query_id: query.id.clone(),
                text: Some("Failed to process".to_string()),
                show_alert: true,
                url: None,
                cache_time: None,
            })?);
        }
        if notifications.is_empty() {
            bail!(
                "handler failed for update {} with no chat to notify: {cause:#}",
                update.id
            );
        }
        for notification in &notifications {
            self.pipeline
                .send_checked(notification)
                .await
                .with_context(|| format!("failed to notify user about handler error: {cause:#}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateProcessor for Dispatcher {
    async fn process(&self, update: &Update) -> Result<()> {
        match self.route(update).await {
            Ok(messages) => {
                if messages.is_empty() {
                    return Ok(());
                }
                // Messages go out in the order the handler returned them.
                self.pipeline.send_all(messages).await;
                Ok(())
            }
            Err(cause) => {
                warn!("handler failed for update {}: {cause:#}", update.id);
                self.notify_handler_error(update, cause).await
            }
        }
    }
}
