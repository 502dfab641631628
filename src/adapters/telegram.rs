use crate::utils::error::{BotError, Result};
use std::path::Path;
use std::time::Duration;
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatId, InputFile, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use url::Url;

pub use teloxide::types::{
    BotCommand, CallbackQuery, InlineKeyboardButton, InlineKeyboardButtonKind, InlineKeyboardMarkup, Me,
    Message, Update, UpdateKind, User,
};

/// Optional metadata attached to an uploaded file.
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub caption: String,
    pub title: Option<String>,
    pub duration: Option<i64>,
}

/// The Bot API calls the bot makes, on top of a teloxide [`Bot`].
///
/// Ids stay plain integers at this boundary; the handlers never see
/// `ChatId`/`MessageId` wrappers or teloxide request builders.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
    api_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, request_timeout: Duration) -> Result<Self> {
        let url = Url::parse(api_url).map_err(|e| BotError::InvalidConfigValueError {
            field: "telegram.api_url".to_string(),
            value: api_url.to_string(),
            reason: e.to_string(),
        })?;

        // getUpdates extends this per request by its long-poll timeout
        let client = teloxide::net::default_reqwest_settings()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BotError::ConfigError {
                message: format!("cannot build the HTTP client: {}", e),
            })?;

        Ok(Self {
            bot: Bot::with_client(token, client).set_api_url(url),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Network errors embed the request URL, which contains the token.
    fn map_error(&self, e: RequestError) -> BotError {
        match e {
            RequestError::Api(ApiError::MessageNotModified) => BotError::TelegramApiError {
                code: 400,
                description: "Bad Request: message is not modified".to_string(),
            },
            RequestError::Api(ApiError::InvalidToken) => BotError::TelegramApiError {
                code: 401,
                description: "Unauthorized".to_string(),
            },
            RequestError::Api(ApiError::Unknown(description)) => BotError::TelegramApiError {
                code: 400,
                description,
            },
            RequestError::Api(other) => BotError::TelegramApiError {
                code: 400,
                description: other.to_string(),
            },
            retry @ RequestError::RetryAfter(_) => BotError::TelegramApiError {
                code: 429,
                description: retry.to_string(),
            },
            RequestError::Network(e) if e.is_timeout() => BotError::Timeout {
                operation: "Telegram request".to_string(),
            },
            RequestError::Network(e) => BotError::TelegramNetworkError {
                message: e.to_string().replace(&self.token, "<token>"),
            },
            other => BotError::TelegramApiError {
                code: 0,
                description: other.to_string().replace(&self.token, "<token>"),
            },
        }
    }

    pub async fn get_me(&self) -> Result<Me> {
        self.bot.get_me().await.map_err(|e| self.map_error(e))
    }

    pub async fn get_updates(&self, offset: i32, timeout_secs: u32) -> Result<Vec<Update>> {
        tracing::trace!("Polling updates from offset {}", offset);
        self.bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .await
            .map_err(|e| self.map_error(e))
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup.clone());
        }
        request.await.map_err(|e| self.map_error(e))
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup.clone());
        }
        request.await.map_err(|e| self.map_error(e))?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(callback_query_id.to_string())
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.bot
            .set_my_commands(commands.to_vec())
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(())
    }

    /// The file is streamed from disk, never buffered whole.
    pub async fn send_video(&self, chat_id: i64, path: &Path, meta: &UploadMeta) -> Result<Message> {
        tracing::debug!("Uploading video {}", path.display());
        let mut request = self
            .bot
            .send_video(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .caption(meta.caption.clone())
            .parse_mode(ParseMode::Html)
            .supports_streaming(true);
        if let Some(duration) = upload_duration(meta) {
            request = request.duration(duration);
        }
        request.await.map_err(|e| self.map_error(e))
    }

    pub async fn send_audio(&self, chat_id: i64, path: &Path, meta: &UploadMeta) -> Result<Message> {
        tracing::debug!("Uploading audio {}", path.display());
        let mut request = self
            .bot
            .send_audio(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .caption(meta.caption.clone())
            .parse_mode(ParseMode::Html);
        if let Some(title) = &meta.title {
            request = request.title(title.clone());
        }
        if let Some(duration) = upload_duration(meta) {
            request = request.duration(duration);
        }
        request.await.map_err(|e| self.map_error(e))
    }
}

fn upload_duration(meta: &UploadMeta) -> Option<u32> {
    meta.duration
        .filter(|d| *d > 0)
        .and_then(|d| u32::try_from(d).ok())
}

/// The callback payload of a button, if it carries one.
pub fn callback_data(button: &InlineKeyboardButton) -> Option<&str> {
    match &button.kind {
        InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use regex::Regex;

    const TOKEN: &str = "123456:TEST-token_abcdefghijklmnop";

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&server.base_url(), TOKEN, Duration::from_secs(5)).unwrap()
    }

    // method names are case-insensitive for the Bot API
    fn method_path(method: &str) -> Regex {
        Regex::new(&format!("(?i)^/bot{}/{}$", regex::escape(TOKEN), method)).unwrap()
    }

    fn message_json(message_id: i32) -> serde_json::Value {
        serde_json::json!({
            "message_id": message_id,
            "date": 1_700_000_000,
            "chat": {"id": 99, "type": "private", "first_name": "Ana"},
            "text": "ok"
        })
    }

    #[tokio::test]
    async fn test_get_updates_decodes_messages_and_callbacks() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path_matches(method_path("getUpdates"))
                .body_contains("\"offset\":42");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 42,
                        "message": {
                            "message_id": 1,
                            "date": 1_700_000_000,
                            "chat": {"id": 99, "type": "private", "first_name": "Ana"},
                            "from": {"id": 7, "is_bot": false, "first_name": "Ana"},
                            "text": "/start"
                        }
                    },
                    {
                        "update_id": 43,
                        "callback_query": {
                            "id": "cb-1",
                            "chat_instance": "x",
                            "from": {"id": 7, "is_bot": false, "first_name": "Ana"},
                            "message": message_json(2),
                            "data": "about"
                        }
                    }
                ]
            }));
        });

        let updates = client(&server).get_updates(42, 0).await.unwrap();
        mock.assert();

        assert_eq!(updates.len(), 2);
        match &updates[0].kind {
            UpdateKind::Message(message) => assert_eq!(message.text(), Some("/start")),
            other => panic!("unexpected update: {:?}", other),
        }
        match &updates[1].kind {
            UpdateKind::CallbackQuery(query) => {
                assert_eq!(query.data.as_deref(), Some("about"));
                assert_eq!(query.regular_message().map(|m| m.chat.id.0), Some(99));
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_token_is_mapped() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path_matches(method_path("getMe"));
            then.status(401).json_body(serde_json::json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            }));
        });

        let err = client(&server).get_me().await.unwrap_err();
        match err {
            BotError::TelegramApiError { code, .. } => assert_eq!(code, 401),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        // nothing listens on port 9
        let client = TelegramClient::new("http://127.0.0.1:9", TOKEN, Duration::from_secs(2)).unwrap();
        let err = client.get_me().await.unwrap_err();
        assert!(!err.to_string().contains("TEST-token"));
    }

    #[tokio::test]
    async fn test_send_message_uses_html_and_keyboard() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path_matches(method_path("sendMessage"))
                .body_contains("\"parse_mode\":\"HTML\"")
                .body_contains("\"callback_data\":\"cancel\"");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": message_json(10)
            }));
        });

        let markup = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("Cancelar", "cancel")]]);
        let sent = client(&server)
            .send_message(99, "<b>hola</b>", Some(&markup))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(sent.id.0, 10);
    }

    #[tokio::test]
    async fn test_send_audio_streams_file_with_title() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path_matches(method_path("sendAudio"))
                .body_contains("filename=\"song.mp3\"")
                .body_contains("ID3 fake mp3")
                .body_contains("name=\"title\"");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": message_json(11)
            }));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"ID3 fake mp3").unwrap();

        let meta = UploadMeta {
            caption: "caption".to_string(),
            title: Some("Song".to_string()),
            duration: Some(200),
        };
        client(&server).send_audio(99, &path, &meta).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_missing_upload_file_is_an_error() {
        let server = MockServer::start();
        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .send_video(99, &dir.path().join("gone.mp4"), &UploadMeta::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_callback_data_of_buttons() {
        assert_eq!(callback_data(&InlineKeyboardButton::callback("Ok", "cancel")), Some("cancel"));
        let link = InlineKeyboardButton::url("Web", "https://example.com".parse().unwrap());
        assert_eq!(callback_data(&link), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TelegramClient::new("https://api.telegram.org", TOKEN, Duration::from_secs(5)).unwrap();
        assert!(!format!("{:?}", client).contains("TEST-token"));
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        let err = TelegramClient::new("not a url", TOKEN, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BotError::InvalidConfigValueError { .. }));
    }
}
