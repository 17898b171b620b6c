//! Thin Bot API client: one method per call the adapter needs.

use std::fmt;
use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{ApiResponse, InlineKeyboardMarkup, Message, Update, User};
use crate::error::{TelegramError, TelegramResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ALLOWED_UPDATES: [&str; 3] = ["message", "channel_post", "callback_query"];

/// Client bound to one bot token.
#[derive(Clone)]
pub struct BotClient {
    http: Client,
    base: String,
}

impl fmt::Debug for BotClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BotClient")
            .field("base", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct ForwardMessage {
    chat_id: i64,
    from_chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct SendDocumentById<'a> {
    chat_id: i64,
    document: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 3],
}

#[derive(Serialize)]
struct NoParams {}

impl BotClient {
    /// Build a client for `token` against `api_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_url: &str, token: &str) -> TelegramResult<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| TelegramError::ClientBuild { source })?;
        Ok(Self {
            http,
            base: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    async fn call<P, R>(&self, method: &'static str, params: &P, timeout: Duration) -> TelegramResult<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|source| TelegramError::transport(method, source))?;
        decode(method, response).await
    }

    /// Post a multipart form without a request timeout; uploads may be long.
    pub(crate) async fn call_multipart<R>(&self, method: &'static str, form: Form) -> TelegramResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|source| TelegramError::transport(method, source))?;
        decode(method, response).await
    }

    /// `getMe`.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is rejected or the API is unreachable.
    pub async fn get_me(&self) -> TelegramResult<User> {
        self.call("getMe", &NoParams {}, REQUEST_TIMEOUT).await
    }

    /// `sendMessage` with an optional inline keyboard.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<Message> {
        let params = SendMessage {
            chat_id,
            text,
            reply_markup,
        };
        self.call("sendMessage", &params, REQUEST_TIMEOUT).await
    }

    /// `editMessageText`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> TelegramResult<()> {
        let params = EditMessageText {
            chat_id,
            message_id,
            text,
            reply_markup,
        };
        // The result is either the edited message or `true`.
        let _: Value = self
            .call("editMessageText", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// `forwardMessage`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> TelegramResult<Message> {
        let params = ForwardMessage {
            chat_id,
            from_chat_id,
            message_id,
        };
        self.call("forwardMessage", &params, REQUEST_TIMEOUT).await
    }

    /// `sendDocument` referencing an already stored file.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn send_document_by_id(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> TelegramResult<Message> {
        let params = SendDocumentById {
            chat_id,
            document: file_id,
            caption,
        };
        self.call("sendDocument", &params, REQUEST_TIMEOUT).await
    }

    /// `answerCallbackQuery`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> TelegramResult<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery { callback_query_id },
                REQUEST_TIMEOUT,
            )
            .await?;
        Ok(())
    }

    /// Long-poll `getUpdates` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> TelegramResult<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call(
            "getUpdates",
            &params,
            REQUEST_TIMEOUT + Duration::from_secs(timeout_secs),
        )
        .await
    }
}

async fn decode<R: DeserializeOwned>(method: &'static str, response: Response) -> TelegramResult<R> {
    let envelope: ApiResponse<R> = response
        .json()
        .await
        .map_err(|source| TelegramError::transport(method, source))?;
    if !envelope.ok {
        return Err(TelegramError::Rejected {
            method,
            code: envelope.error_code,
            description: envelope
                .description
                .unwrap_or_else(|| "unknown bot api error".to_string()),
        });
    }
    envelope
        .result
        .ok_or(TelegramError::MissingResult { method })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_message_posts_keyboard_and_returns_message() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botTOKEN/sendMessage").json_body(json!({
                "chat_id": 42,
                "text": "hello",
                "reply_markup": { "inline_keyboard": [[{ "text": "⬇️ 1", "callback_data": "dl_x" }]] }
            }));
            then.status(200).json_body(json!({
                "ok": true,
                "result": { "message_id": 7, "chat": { "id": 42 } }
            }));
        });

        let client = BotClient::new(&server.base_url(), "TOKEN")?;
        let markup = InlineKeyboardMarkup::from_grid(&[vec![marquee_core::Button::new(
            "⬇️ 1", "dl_x",
        )]]);
        let message = client.send_message(42, "hello", markup).await?;
        assert_eq!(message.message_id, 7);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn rejected_calls_surface_description() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/botBAD/getMe");
            then.status(401).json_body(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            }));
        });

        let client = BotClient::new(&server.base_url(), "BAD")?;
        let err = client.get_me().await.expect_err("token should be rejected");
        assert!(matches!(
            err,
            TelegramError::Rejected {
                method: "getMe",
                code: Some(401),
                ..
            }
        ));
        assert_eq!(err.to_string(), "Unauthorized");
        Ok(())
    }

    #[test]
    fn debug_output_redacts_token() -> anyhow::Result<()> {
        let client = BotClient::new("https://api.telegram.org/", "123:SECRET")?;
        assert!(!format!("{client:?}").contains("SECRET"));
        assert_eq!(
            client.url("getMe"),
            "https://api.telegram.org/bot123:SECRET/getMe"
        );
        Ok(())
    }
}
