use anyhow::{Context, Result};
use serde::Deserialize;

/// A user as reported by the Bot API.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    Hashtag,
    BotCommand,
    Url,
    Email,
    Bold,
    Italic,
    Code,
    Pre,
    TextLink,
    #[serde(other)]
    Other,
}

/// A span of message text tagged by the platform (command, mention, link, ...).
/// Offsets are into the message text, as sent on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    #[serde(rename = "file_id")]
    pub id: String,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sticker {
    #[serde(rename = "file_id")]
    pub id: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(rename = "message_id")]
    pub id: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub sticker: Option<Sticker>,
    #[serde(default, rename = "photo")]
    pub photos: Vec<PhotoSize>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

/// The payload of one update. Exactly one case is active per update.
#[derive(Debug, Clone)]
pub enum UpdatePayload {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
}

/// One inbound event from the platform. IDs are assigned by the platform and
/// strictly increase.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawUpdate")]
pub struct Update {
    pub id: i64,
    pub payload: UpdatePayload,
}

impl Update {
    /// The message carried by this update, if any. Callback queries expose
    /// the message the inline keyboard was attached to.
    pub fn message(&self) -> Option<&Message> {
        match &self.payload {
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m) => Some(m),
            UpdatePayload::CallbackQuery(q) => q.message.as_ref(),
            _ => None,
        }
    }

    /// Chat the update originated from, when it carries one.
    pub fn chat_id(&self) -> Option<i64> {
        self.message().and_then(|m| m.chat.as_ref()).map(|c| c.id)
    }
}

/// Wire shape of an update: one-of-many optional fields. Converted into the
/// tagged [`UpdatePayload`] on decode.
#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    edited_message: Option<Message>,
    #[serde(default)]
    channel_post: Option<Message>,
    #[serde(default)]
    edited_channel_post: Option<Message>,
    #[serde(default)]
    inline_query: Option<InlineQuery>,
    #[serde(default)]
    chosen_inline_result: Option<ChosenInlineResult>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

impl TryFrom<RawUpdate> for Update {
    type Error = String;

    fn try_from(raw: RawUpdate) -> std::result::Result<Self, Self::Error> {
        let payload = if let Some(m) = raw.message {
            UpdatePayload::Message(m)
        } else if let Some(m) = raw.edited_message {
            UpdatePayload::EditedMessage(m)
        } else if let Some(m) = raw.channel_post {
            UpdatePayload::ChannelPost(m)
        } else if let Some(m) = raw.edited_channel_post {
            UpdatePayload::EditedChannelPost(m)
        } else if let Some(q) = raw.inline_query {
            UpdatePayload::InlineQuery(q)
        } else if let Some(r) = raw.chosen_inline_result {
            UpdatePayload::ChosenInlineResult(r)
        } else if let Some(q) = raw.callback_query {
            UpdatePayload::CallbackQuery(q)
        } else {
            return Err(format!("update {} carries no payload", raw.update_id));
        };
        Ok(Update {
            id: raw.update_id,
            payload,
        })
    }
}

/// Decoded getUpdates reply.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBatch {
    pub ok: bool,
    #[serde(default, rename = "result")]
    pub updates: Vec<Update>,
}

/// Decoded acknowledgment for one outbound send.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub ok: bool,
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub message: Option<Message>,
}

/// Raw send acknowledgment. The `result` field is not type-stable: a plain
/// boolean for calls without an echoed resource, a message object otherwise.
#[derive(Deserialize)]
struct RawSendResult {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

pub fn decode_update_batch(body: &[u8]) -> Result<UpdateBatch> {
    serde_json::from_slice(body).context("failed to decode update batch")
}

/// Two-phase decode: try `result` as a boolean first, only then as a
/// message object.
pub fn decode_send_result(body: &[u8]) -> Result<SendResult> {
    let raw: RawSendResult =
        serde_json::from_slice(body).context("failed to decode send acknowledgment")?;
    match raw.result {
        Some(serde_json::Value::Bool(_)) => Ok(SendResult {
            ok: true,
            error_code: None,
            description: None,
            message: None,
        }),
        Some(value) => {
            let message: Message = serde_json::from_value(value)
                .context("failed to decode echoed message in send acknowledgment")?;
            Ok(SendResult {
                ok: raw.ok,
                error_code: raw.error_code,
                description: raw.description,
                message: Some(message),
            })
        }
        None => Ok(SendResult {
            ok: raw.ok,
            error_code: raw.error_code,
            description: raw.description,
            message: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_update() {
        let body = br#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "date": 1500000000,
                "chat": {"id": 100, "type": "private", "first_name": "Ann"},
                "from": {"id": 100, "first_name": "Ann"},
                "text": "hello"
            }
        }"#;
        let update: Update = serde_json::from_slice(body).unwrap();
        assert_eq!(update.id, 42);
        match &update.payload {
            UpdatePayload::Message(m) => {
                assert_eq!(m.text, "hello");
                assert_eq!(m.chat.as_ref().unwrap().id, 100);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(update.chat_id(), Some(100));
    }

    #[test]
    fn test_decode_callback_query_update() {
        let body = br#"{
            "update_id": 9,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 5, "first_name": "Bob"},
                "data": "/list",
                "message": {
                    "message_id": 3,
                    "date": 1500000000,
                    "chat": {"id": 77, "type": "private"}
                }
            }
        }"#;
        let update: Update = serde_json::from_slice(body).unwrap();
        match &update.payload {
            UpdatePayload::CallbackQuery(q) => assert_eq!(q.data, "/list"),
            other => panic!("unexpected payload: {:?}", other),
        }
        // The chat is resolved through the callback's carried message.
        assert_eq!(update.chat_id(), Some(77));
    }

    #[test]
    fn test_decode_empty_update_is_error() {
        let body = br#"{"update_id": 3}"#;
        let result: std::result::Result<Update, _> = serde_json::from_slice(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_update_batch_preserves_order() {
        let body = br#"{"ok": true, "result": [
            {"update_id": 5, "message": {"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "a"}},
            {"update_id": 7, "message": {"message_id": 2, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "b"}},
            {"update_id": 6, "message": {"message_id": 3, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "c"}}
        ]}"#;
        let batch = decode_update_batch(body).unwrap();
        assert!(batch.ok);
        let ids: Vec<i64> = batch.updates.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![5, 7, 6]);
    }

    #[test]
    fn test_decode_send_result_boolean() {
        let body = br#"{"ok": true, "result": true}"#;
        let result = decode_send_result(body).unwrap();
        assert!(result.ok);
        assert!(result.message.is_none());
        assert!(result.error_code.is_none());
    }

    #[test]
    fn test_decode_send_result_message_object() {
        let body = br#"{"ok": true, "result": {
            "message_id": 15,
            "date": 1500000001,
            "chat": {"id": 42, "type": "private"},
            "text": "sent text"
        }}"#;
        let result = decode_send_result(body).unwrap();
        assert!(result.ok);
        let message = result.message.unwrap();
        assert_eq!(message.id, 15);
        assert_eq!(message.text, "sent text");
    }

    #[test]
    fn test_decode_send_result_error_reply() {
        let body = br#"{"ok": false, "error_code": 400, "description": "Bad Request"}"#;
        let result = decode_send_result(body).unwrap();
        assert!(!result.ok);
        assert_eq!(result.error_code, Some(400));
        assert_eq!(result.description.as_deref(), Some("Bad Request"));
        assert!(result.message.is_none());
    }

    #[test]
    fn test_unknown_entity_kind_tolerated() {
        let body = br#"{
            "update_id": 1,
            "message": {
                "message_id": 1,
                "date": 0,
                "chat": {"id": 1, "type": "private"},
                "text": "hush",
                "entities": [{"type": "spoiler", "offset": 0, "length": 4}]
            }
        }"#;
        let update: Update = serde_json::from_slice(body).unwrap();
        let message = update.message().unwrap();
        assert_eq!(message.entities[0].kind, EntityKind::Other);
    }
}
