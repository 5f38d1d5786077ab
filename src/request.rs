use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::markup::ReplyMarkup;
use crate::update::SendResult;

pub const DEFAULT_API_ROOT: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Callback invoked exactly once with the outcome of one send attempt.
/// `Sync` so that `&OutboundMessage` stays `Send` across await points.
pub type OnSent = Box<dyn FnOnce(Result<SendResult>) + Send + Sync + 'static>;

/// An opaque outbound request descriptor: everything the transport needs,
/// nothing it has to interpret.
pub struct OutboundMessage {
    pub url: String,
    pub method: HttpMethod,
    pub body: Vec<u8>,
    pub content_type: String,
    pub on_sent: Option<OnSent>,
}

impl OutboundMessage {
    /// Attach a result callback; the default is a logging callback in the
    /// send pipeline.
    pub fn with_callback(
        mut self,
        callback: impl FnOnce(Result<SendResult>) + Send + Sync + 'static,
    ) -> Self {
        self.on_sent = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessage")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .field("has_callback", &self.on_sent.is_some())
            .finish()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    Markdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_notification: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub reply_to_message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

impl SendMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            disable_web_page_preview: false,
            disable_notification: false,
            reply_to_message_id: 0,
            reply_markup: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendSticker {
    pub chat_id: i64,
    pub sticker: String,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_notification: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub reply_to_message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

impl SendSticker {
    pub fn new(chat_id: i64, sticker: impl Into<String>) -> Self {
        Self {
            chat_id,
            sticker: sticker.into(),
            disable_notification: false,
            reply_to_message_id: 0,
            reply_markup: None,
        }
    }
}

/// Send a photo the platform already stores, by file id.
#[derive(Debug, Clone, Serialize)]
pub struct SendPhoto {
    pub chat_id: i64,
    pub photo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_notification: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub reply_to_message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQuery {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub show_alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<i64>,
}

/// Builds outbound request descriptors for each Bot API method. The base URL
/// is templated with the bot token once at construction.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    api_root: String,
    token: String,
}

impl RequestFactory {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_root(DEFAULT_API_ROOT, token)
    }

    /// Custom API root, e.g. a local stub server in tests.
    pub fn with_api_root(api_root: &str, token: impl Into<String>) -> Self {
        Self {
            api_root: api_root.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_root, self.token, method)
    }

    fn post_json<T: Serialize>(&self, method: &str, payload: &T) -> Result<OutboundMessage> {
        let body = serde_json::to_vec(payload)
            .with_context(|| format!("failed to encode {} request", method))?;
        Ok(OutboundMessage {
            url: self.method_url(method),
            method: HttpMethod::Post,
            body,
            content_type: "application/json".to_string(),
            on_sent: None,
        })
    }

    /// getUpdates as a GET with query parameters; zero-valued parameters are
    /// omitted, so `limit = 0` means "unbounded batch" on the platform side.
    pub fn get_updates(&self, offset: i64, limit: i64, timeout: i64) -> OutboundMessage {
        let mut params = Vec::new();
        if offset > 0 {
            params.push(format!("offset={}", offset));
        }
        if limit > 0 {
            params.push(format!("limit={}", limit));
        }
        if timeout > 0 {
            params.push(format!("timeout={}", timeout));
        }
        let mut url = self.method_url("getUpdates");
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        OutboundMessage {
            url,
            method: HttpMethod::Get,
            body: Vec::new(),
            content_type: String::new(),
            on_sent: None,
        }
    }

    pub fn send_message(&self, request: &SendMessage) -> Result<OutboundMessage> {
        self.post_json("sendMessage", request)
    }

    pub fn send_sticker(&self, request: &SendSticker) -> Result<OutboundMessage> {
        self.post_json("sendSticker", request)
    }

    pub fn send_photo(&self, request: &SendPhoto) -> Result<OutboundMessage> {
        self.post_json("sendPhoto", request)
    }

    pub fn answer_callback_query(&self, request: &AnswerCallbackQuery) -> Result<OutboundMessage> {
        self.post_json("answerCallbackQuery", request)
    }

    /// Upload a photo from memory as a multipart form.
    pub fn upload_photo(
        &self,
        chat_id: i64,
        filename: &str,
        photo: &[u8],
        caption: Option<&str>,
    ) -> Result<OutboundMessage> {
        let chat_id = chat_id.to_string();
        let mut fields = vec![("chat_id", chat_id.as_str())];
        if let Some(caption) = caption {
            fields.push(("caption", caption));
        }
        let (body, content_type) = multipart_body(&fields, Some(("photo", filename, photo)));
        Ok(OutboundMessage {
            url: self.method_url("sendPhoto"),
            method: HttpMethod::Post,
            body,
            content_type,
            on_sent: None,
        })
    }

    /// Register `public_url` as the webhook callback. A self-signed
    /// certificate travels along as a file part.
    pub fn subscribe_webhook(
        &self,
        public_url: &str,
        certificate: Option<(&str, &[u8])>,
    ) -> Result<OutboundMessage> {
        let file = certificate.map(|(filename, bytes)| ("certificate", filename, bytes));
        let (body, content_type) = multipart_body(&[("url", public_url)], file);
        Ok(OutboundMessage {
            url: self.method_url("setWebhook"),
            method: HttpMethod::Post,
            body,
            content_type,
            on_sent: None,
        })
    }

    /// Clear any registered webhook so polling does not compete with push
    /// delivery.
    pub fn unsubscribe_webhook(&self) -> Result<OutboundMessage> {
        self.post_json("setWebhook", &serde_json::json!({ "url": "" }))
    }
}

fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (Vec<u8>, String) {
    // Fresh boundary per request so uploaded bytes cannot collide with it.
    let boundary = format!("----botloop-form-{}", uuid::Uuid::new_v4().simple());
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (body, format!("multipart/form-data; boundary={boundary}"))
}
