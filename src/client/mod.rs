//! HTTP client for the chat backend.
//!
//! `BackendClient` wraps a cookie-carrying `reqwest::Client`; session
//! credentials set by the backend are replayed on every request. Streamed
//! answers are not bounded by the request timeout, everything else is.

pub mod decoder;
pub mod error;
pub mod transport;
pub mod types;

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::chat::ids::{ConversationId, FileId};
use crate::chat::message::MessageRecord;
use crate::config::ChatClientConfig;

pub use decoder::Utf8StreamDecoder;
pub use error::{ClientError, ClientResult};
pub use transport::{BackendFuture, ChatBackend, CompletionStream, FragmentStream, decode_fragments};
pub use types::{
    ChatList, ChatSummary, FileRef, FileUpload, QuestionPayload, SearchAnswer, SessionInfo,
    StatusResponse, StoreMessageBody, UploadResponse, User,
};

/// Response header carrying the id of a newly created conversation.
pub const CHAT_ID_HEADER: &str = "x-chat-id";

/// Client for the chat backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl BackendClient {
    /// Create a client from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ChatClientConfig) -> ClientResult<Self> {
        let base = config
            .base_url()
            .map_err(|err| ClientError::HttpClient(err.to_string()))?;
        Ok(Self {
            http: Self::build_client(config)?,
            base,
            request_timeout: config.request_timeout,
        })
    }

    /// Create a client with default settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults() -> ClientResult<Self> {
        Self::new(&ChatClientConfig::default())
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn build_client(config: &ChatClientConfig) -> ClientResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));

        reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn messages_path(conversation: &ConversationId) -> String {
        format!("api/messages/{}", urlencoding::encode(conversation.as_str()))
    }

    /// Fetch the signed-in user, `None` when the session is anonymous.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn current_user(&self) -> ClientResult<Option<User>> {
        let info: SessionInfo = self.get_json("auth/me").await?;
        if info.status {
            Ok(info.user)
        } else {
            debug!("no signed-in user");
            Ok(None)
        }
    }

    /// End the backend session. Returns whether the backend confirmed it.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn logout(&self) -> ClientResult<bool> {
        let response: StatusResponse = self.get_json("auth/logout").await?;
        Ok(response.status)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let request = self.http.get(self.endpoint(path)?);
        self.send_json(request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)?).json(body);
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.timeout(self.request_timeout).send().await?;
        let body = checked(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn stream_question(
        &self,
        path: &str,
        payload: &QuestionPayload,
    ) -> ClientResult<CompletionStream> {
        let url = self.endpoint(path)?;
        info!(endpoint = %url, first_message = payload.first_message, "asking question");
        let response = checked(self.http.post(url).json(payload).send().await?).await?;
        let conversation_id = response
            .headers()
            .get(CHAT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        debug!(?conversation_id, "answer stream established");
        Ok(CompletionStream {
            conversation_id,
            fragments: transport::decode_fragments(response.bytes_stream()),
        })
    }

    async fn upload(&self, file: FileUpload) -> ClientResult<FileId> {
        let size = file.size();
        let name = file.name.clone();
        let mut part = Part::bytes(file.bytes).file_name(file.name);
        if !file.mime.is_empty() {
            part = part.mime_str(&file.mime)?;
        }
        let form = Form::new().part("file", part);
        let request = self.http.post(self.endpoint("upload-file")?).multipart(form);
        let uploaded: UploadResponse = self.send_json(request).await?;
        info!(file = %name, size, file_id = %uploaded.file_id, "file uploaded");
        Ok(uploaded.file_id)
    }
}

async fn checked(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "backend returned an error status");
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

impl ChatBackend for BackendClient {
    fn ask_question(
        &self,
        payload: QuestionPayload,
    ) -> BackendFuture<'_, ClientResult<CompletionStream>> {
        Box::pin(async move { self.stream_question("ask-question", &payload).await })
    }

    fn ask_file_question(
        &self,
        payload: QuestionPayload,
    ) -> BackendFuture<'_, ClientResult<CompletionStream>> {
        Box::pin(async move { self.stream_question("ask-file-question", &payload).await })
    }

    fn search_web(&self, payload: QuestionPayload) -> BackendFuture<'_, ClientResult<SearchAnswer>> {
        Box::pin(async move {
            info!(first_message = payload.first_message, "searching the web");
            self.post_json("search-web", &payload).await
        })
    }

    fn upload_file(&self, file: FileUpload) -> BackendFuture<'_, ClientResult<FileId>> {
        Box::pin(self.upload(file))
    }

    fn store_message(
        &self,
        conversation: ConversationId,
        record: MessageRecord,
    ) -> BackendFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            let body = StoreMessageBody { message: record };
            let _: serde_json::Value = self
                .post_json(&Self::messages_path(&conversation), &body)
                .await?;
            Ok(())
        })
    }

    fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> BackendFuture<'_, ClientResult<Vec<MessageRecord>>> {
        Box::pin(async move { self.get_json(&Self::messages_path(&conversation)).await })
    }

    fn fetch_chats(&self) -> BackendFuture<'_, ClientResult<Vec<ChatSummary>>> {
        Box::pin(async move {
            let list: ChatList = self.get_json("chats").await?;
            Ok(list.chats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_against_base_path() {
        let config = ChatClientConfig::new().with_base_url("http://localhost:8000/api/v2");
        let client = BackendClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint("ask-question").unwrap().as_str(),
            "http://localhost:8000/api/v2/ask-question"
        );
    }

    #[test]
    fn test_messages_path_is_encoded() {
        let path = BackendClient::messages_path(&ConversationId::new("a/b c"));
        assert_eq!(path, "api/messages/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = ChatClientConfig::new().with_base_url("::not a url::");
        assert!(matches!(
            BackendClient::new(&config),
            Err(ClientError::HttpClient(_))
        ));
    }
}
