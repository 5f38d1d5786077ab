use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::request::OutboundMessage;
use crate::update::Update;

/// One resolved command invocation: the text after the command token
/// (trimmed) plus the update it came from.
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub argument: String,
    pub update: Update,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, call: CommandCall) -> Result<Vec<OutboundMessage>>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, update: Update) -> Result<Vec<OutboundMessage>>;
}

/// Registry mapping command names to handlers, plus the default handler for
/// plain messages. Built before the engine starts and immutable afterwards:
/// no lock is needed during dispatch.
pub struct BotHandlers {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    on_message: Arc<dyn MessageHandler>,
}

impl BotHandlers {
    pub fn new(on_message: Arc<dyn MessageHandler>) -> Self {
        Self {
            commands: HashMap::new(),
            on_message,
        }
    }

    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<()> {
        let name = name.into();
        if self.commands.contains_key(&name) {
            bail!("command handler already registered: {}", name);
        }
        self.commands.insert(name, handler);
        Ok(())
    }

    pub async fn on_command(&self, name: &str, call: CommandCall) -> Result<Vec<OutboundMessage>> {
        let Some(handler) = self.commands.get(name) else {
            bail!("no handler registered for command: {}", name);
        };
        handler.handle(call).await
    }

    pub async fn on_message(&self, update: Update) -> Result<Vec<OutboundMessage>> {
        self.on_message.handle(update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::Update;

    struct NoopMessage;

    #[async_trait]
    impl MessageHandler for NoopMessage {
        async fn handle(&self, _update: Update) -> Result<Vec<OutboundMessage>> {
            Ok(Vec::new())
        }
    }

    struct NamedCommand(&'static str);

    #[async_trait]
    impl CommandHandler for NamedCommand {
        async fn handle(&self, _call: CommandCall) -> Result<Vec<OutboundMessage>> {
            bail!("invoked: {}", self.0)
        }
    }

    fn update() -> Update {
        let body = br#"{
            "update_id": 1,
            "message": {"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "x"}
        }"#;
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut handlers = BotHandlers::new(Arc::new(NoopMessage));
        handlers
            .register_command("/rem", Arc::new(NamedCommand("first")))
            .unwrap();
        let err = handlers
            .register_command("/rem", Arc::new(NamedCommand("second")))
            .unwrap_err();
        assert!(err.to_string().contains("/rem"));
    }

    #[tokio::test]
    async fn test_unknown_command_is_an_error() {
        let handlers = BotHandlers::new(Arc::new(NoopMessage));
        let call = CommandCall {
            argument: String::new(),
            update: update(),
        };
        let err = handlers.on_command("/missing", call).await.unwrap_err();
        assert!(err.to_string().contains("/missing"));
    }

    #[tokio::test]
    async fn test_registered_command_dispatched() {
        let mut handlers = BotHandlers::new(Arc::new(NoopMessage));
        handlers
            .register_command("/rem", Arc::new(NamedCommand("rem")))
            .unwrap();
        let call = CommandCall {
            argument: String::new(),
            update: update(),
        };
        let err = handlers.on_command("/rem", call).await.unwrap_err();
        assert_eq!(err.to_string(), "invoked: rem");
    }
}
