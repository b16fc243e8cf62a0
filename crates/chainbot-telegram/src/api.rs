//! Minimal Telegram Bot API client.

use crate::error::TelegramError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Longest text a single `sendMessage` accepts.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if !self.ok {
            return Err(TelegramError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.result
            .ok_or_else(|| TelegramError::Decode("ok response without result".to_string()))
    }
}

/// Bot API over HTTPS. The token is part of every URL and is never logged.
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TelegramApi(<token redacted>)")
    }
}

impl TelegramApi {
    /// `poll_timeout` is the long-polling wait; the HTTP timeout allows for it.
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(15))
            .build()
            .map_err(|e| TelegramError::Http(e.without_url()))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token.trim()),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, TelegramError> {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| TelegramError::Http(e.without_url()))?;
        response.into_result()
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// Long poll for new messages after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Send HTML text, split into several messages when it is too long.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let _: Message = self
                .call(
                    "sendMessage",
                    &json!({
                        "chat_id": chat_id,
                        "text": chunk,
                        "parse_mode": "HTML",
                        "disable_web_page_preview": true,
                    }),
                )
                .await?;
        }
        debug!(chat_id, "message sent");
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }
}

/// Split `text` into chunks of at most `max` characters, on line boundaries
/// where possible.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let mut flush = |current: &mut String, chunks: &mut Vec<String>| {
        let chunk = current.trim_end_matches('\n');
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        current.clear();
    };

    for line in text.split_inclusive('\n') {
        let len = line.chars().count();
        if current_len + len > max {
            flush(&mut current, &mut chunks);
            current_len = 0;
        }
        if len > max {
            let chars: Vec<char> = line.chars().collect();
            let mut start = 0;
            while start < chars.len() {
                let end = markup_safe_cut(&chars, start, (start + max).min(chars.len()));
                current.extend(chars[start..end].iter());
                flush(&mut current, &mut chunks);
                start = end;
            }
            continue;
        }
        current.push_str(line);
        current_len += len;
    }
    flush(&mut current, &mut chunks);
    chunks
}

/// Pull `end` back before an HTML tag or entity that would otherwise be cut
/// in half. Markup longer than a whole chunk is cut anyway.
fn markup_safe_cut(chars: &[char], start: usize, end: usize) -> usize {
    if end == chars.len() {
        return end;
    }
    let window = &chars[start..end];
    let open = window.iter().rposition(|&c| c == '<' || c == '&');
    match open {
        Some(i) if i > 0 => {
            let close = if window[i] == '<' { '>' } else { ';' };
            if window[i..].contains(&close) {
                end
            } else {
                start + i
            }
        }
        _ => end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", 4096), vec!["hello\nworld"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_split_on_lines() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_long_line_is_cut() {
        let text = "x".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_long_line_keeps_markup_whole() {
        let text = format!("{}<b>bold</b> &amp; more", "x".repeat(8));
        let chunks = split_message(&text, 10);
        assert_eq!(chunks[0], "x".repeat(8));
        assert_eq!(chunks[1], "<b>bold");
        assert_eq!(chunks[2], "</b> &amp;");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks[2..] {
            assert!(!chunk.starts_with(';') && !chunk.starts_with("amp"));
        }

        let entity = format!("{}&lt;tag", "y".repeat(7));
        assert_eq!(split_message(&entity, 9), vec!["y".repeat(7), "&lt;tag".to_string()]);
    }

    #[test]
    fn test_chunks_never_exceed_limit() {
        let text: String = (0..500).map(|i| format!("line {i} ✅\n")).collect();
        for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
            assert!(chunk.chars().count() <= MAX_MESSAGE_CHARS);
        }
    }

    #[test]
    fn test_api_error_mapping() {
        let body = r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#;
        let response: ApiResponse<Message> = serde_json::from_str(body).unwrap();
        match response.into_result() {
            Err(TelegramError::Api { code, description }) => {
                assert_eq!(code, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_update_parsing() {
        let body = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":5,"chat":{"id":42,"type":"private"},
             "from":{"id":42,"is_bot":false,"first_name":"Ann","username":"ann"},"text":"/start"}},
            {"update_id":11}
        ]}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let updates = response.into_result().unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert!(message.chat.is_private());
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }
}
