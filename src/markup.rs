//! Reply-markup payloads attached to outbound messages. Serialize-only: the
//! platform never echoes these back.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_inline_query: Option<String>,
}

impl InlineKeyboardButton {
    /// Button that fires a callback query carrying `data`.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
            switch_inline_query: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_location: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub resize_keyboard: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub one_time_keyboard: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub selective: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardHide {
    pub hide_keyboard: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub selective: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    InlineKeyboard(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
    Hide(ReplyKeyboardHide),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_keyboard_serializes_rows() {
        let markup = ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton::callback("List", "/list"),
                InlineKeyboardButton::callback("Remember", "/rem"),
            ]],
        });
        let json = serde_json::to_string(&markup).unwrap();
        assert!(json.contains(r#""inline_keyboard""#));
        assert!(json.contains(r#""callback_data":"/list""#));
        assert!(!json.contains("switch_inline_query"));
    }

    #[test]
    fn test_false_flags_omitted() {
        let markup = ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: vec![vec![KeyboardButton {
                text: "hi".to_string(),
                request_contact: false,
                request_location: false,
            }]],
            resize_keyboard: false,
            one_time_keyboard: false,
            selective: false,
        });
        let json = serde_json::to_string(&markup).unwrap();
        assert!(!json.contains("resize_keyboard"));
        assert!(!json.contains("request_contact"));
    }
}
