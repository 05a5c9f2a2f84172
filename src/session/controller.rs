//! One conversation's send orchestration.
//!
//! `ChatSession` owns the conversation's [`StreamAssembler`] and drives each
//! send from the user's message to the finished answer: route to the right
//! endpoint, resolve the conversation id, pull the stream, and turn every
//! failure into a visible assistant message. `send` takes `&mut self`, so a
//! session never has two answers in flight.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chat::assembler::{AssembleError, StreamAssembler};
use crate::chat::ids::{ConversationId, FileId, MessageId};
use crate::chat::message::{Message, MessageKind, MessageRecord, Role, Tool};
use crate::chat::message_list::MessageSnapshot;
use crate::client::error::ClientError;
use crate::client::transport::{ChatBackend, CompletionStream};
use crate::client::types::{ChatSummary, FileRef, FileUpload, QuestionPayload};
use crate::config::ChatClientConfig;
use crate::session::attachments::{AttachmentTray, PendingAttachment, UploadStatus};
use crate::store::AppStore;

/// Assistant text shown when an answer could not be obtained at all.
pub const SEND_FAILURE_NOTICE: &str = "⚠️ Sorry, I encountered an error. Please try again.";
/// Suffix added when an answer stream breaks off.
pub const STREAM_FAILURE_NOTICE: &str = "⚠️ Error occurred while streaming response";

/// Errors that prevent a session operation from running.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No text and no attachments.
    #[error("nothing to send")]
    EmptyQuestion,
    /// The message list rejected an update.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    /// A backend request failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Convenience result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// What the user submitted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SendRequest {
    /// Question text, sent as typed.
    pub text: String,
    /// Capability picked in the input, if any.
    pub tool: Option<Tool>,
}

impl SendRequest {
    /// Plain question.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool: None,
        }
    }

    /// Question for a specific capability.
    #[must_use]
    pub fn with_tool(text: impl Into<String>, tool: Tool) -> Self {
        Self {
            text: text.into(),
            tool: Some(tool),
        }
    }
}

/// Why a send ended without a complete answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendFailure {
    /// The request failed before any answer arrived.
    NotEstablished,
    /// A new conversation got no id from the backend.
    MissingConversationId,
    /// The answer stream broke off; partial content was kept.
    StreamInterrupted,
}

impl SendFailure {
    /// Whether the answer was lost entirely.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::StreamInterrupted)
    }
}

/// Outcome of one send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendReport {
    /// The user's message.
    pub user_message: MessageId,
    /// The assistant's answer or failure notice.
    pub assistant_message: MessageId,
    /// Conversation after the send.
    pub conversation_id: Option<ConversationId>,
    /// Route to open when the send created the conversation.
    pub navigate_to: Option<String>,
    /// Set when the answer is a failure notice or was cut short.
    pub failure: Option<SendFailure>,
}

/// How the answer to one send ended.
struct Outcome {
    assistant_message: MessageId,
    conversation_id: Option<ConversationId>,
    navigate_to: Option<String>,
    failure: Option<SendFailure>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Route {
    FileQuestion,
    WebSearch,
    Question,
}

/// Marks the session busy until dropped.
struct InFlight(Arc<watch::Sender<bool>>);

impl InFlight {
    fn start(flag: &Arc<watch::Sender<bool>>) -> Self {
        flag.send_replace(true);
        Self(Arc::clone(flag))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// A conversation and the machinery to continue it.
pub struct ChatSession<B: ChatBackend + 'static> {
    backend: Arc<B>,
    store: Arc<AppStore>,
    assembler: StreamAssembler,
    conversation_id: Option<ConversationId>,
    in_flight: Arc<watch::Sender<bool>>,
    attachments: AttachmentTray,
    persist_messages: bool,
}

impl<B: ChatBackend + 'static> ChatSession<B> {
    /// Start with an empty, not yet created conversation.
    #[must_use]
    pub fn new(backend: Arc<B>, store: Arc<AppStore>, config: &ChatClientConfig) -> Self {
        Self {
            backend,
            store,
            assembler: StreamAssembler::new(),
            conversation_id: None,
            in_flight: Arc::new(watch::Sender::new(false)),
            attachments: AttachmentTray::new(),
            persist_messages: config.persist_messages,
        }
    }

    /// Conversation id, `None` until the first answer creates it.
    #[must_use]
    pub const fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Observe the message list.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MessageSnapshot> {
        self.assembler.subscribe()
    }

    /// Latest message list.
    #[must_use]
    pub fn snapshot(&self) -> MessageSnapshot {
        self.assembler.snapshot()
    }

    /// Observe whether a send is running.
    #[must_use]
    pub fn subscribe_in_flight(&self) -> watch::Receiver<bool> {
        self.in_flight.subscribe()
    }

    /// Whether a send is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    /// Files attached to the next question.
    #[must_use]
    pub const fn attachments(&self) -> &AttachmentTray {
        &self.attachments
    }

    /// Upload a file for the next question.
    pub async fn attach(&mut self, file: FileUpload) -> UploadStatus {
        self.attachments.upload(self.backend.as_ref(), file).await
    }

    /// Drop an attached file that is not uploading.
    pub fn detach(&mut self, id: &FileId) -> bool {
        self.attachments.remove(id)
    }

    /// Forget the current conversation and start a new one.
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.attachments = AttachmentTray::new();
        self.assembler.seed_history(Vec::new());
    }

    /// Open a stored conversation.
    ///
    /// # Errors
    /// Returns an error if the history cannot be fetched.
    pub async fn load_history(&mut self, conversation: ConversationId) -> SessionResult<usize> {
        let records = self.backend.fetch_messages(conversation.clone()).await?;
        let messages: Vec<Message> = records.into_iter().map(Message::from).collect();
        let count = messages.len();
        self.assembler.seed_history(messages);
        info!(conversation = %conversation, count, "conversation opened");
        self.store.select_chat(conversation.clone());
        self.conversation_id = Some(conversation);
        Ok(count)
    }

    /// Reload the conversation list into the store.
    ///
    /// # Errors
    /// Returns an error if the list cannot be fetched.
    pub async fn refresh_chats(&self) -> SessionResult<usize> {
        let chats = self.backend.fetch_chats().await?;
        let count = chats.len();
        self.store.set_chats(chats);
        Ok(count)
    }

    /// Send a question and wait for its answer to complete.
    ///
    /// Backend failures do not surface as `Err`: they end up as assistant
    /// messages and are described by [`SendReport::failure`].
    ///
    /// # Errors
    /// Returns an error if there is nothing to send.
    pub async fn send(&mut self, request: SendRequest) -> SessionResult<SendReport> {
        if request.text.trim().is_empty() && self.attachments.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let _busy = InFlight::start(&self.in_flight);

        let attachments = self.attachments.take();
        let files: Vec<FileRef> = attachments
            .iter()
            .filter_map(PendingAttachment::file_ref)
            .collect();
        let file_names: Vec<String> = attachments
            .iter()
            .map(|file| file.name.clone())
            .filter(|name| !name.is_empty())
            .collect();
        let kind = MessageKind::from_parts(request.tool, file_names);
        let user_message = self.assembler.push(Message::user(
            request.text.clone(),
            kind,
            self.conversation_id.clone(),
        ));

        let route = if !files.is_empty() {
            Route::FileQuestion
        } else if request.tool == Some(Tool::WebSearch) {
            Route::WebSearch
        } else {
            Route::Question
        };
        if attachments.len() > files.len() {
            warn!(
                attached = attachments.len(),
                usable = files.len(),
                "some attachments failed to upload and are left out"
            );
        }
        info!(?route, new_conversation = self.conversation_id.is_none(), "sending question");

        let outcome = match route {
            Route::WebSearch => self.search(&request).await?,
            Route::FileQuestion => {
                let payload = QuestionPayload::new(
                    request.text.clone(),
                    self.conversation_id.as_ref(),
                    Tool::Llm,
                )
                .with_files(files);
                let established = self.backend.ask_file_question(payload).await;
                self.stream_answer(established).await?
            }
            Route::Question => {
                let payload = QuestionPayload::new(
                    request.text.clone(),
                    self.conversation_id.as_ref(),
                    Tool::Llm,
                );
                let established = self.backend.ask_question(payload).await;
                self.stream_answer(established).await?
            }
        };
        let report = SendReport {
            user_message,
            assistant_message: outcome.assistant_message,
            conversation_id: outcome.conversation_id,
            navigate_to: outcome.navigate_to,
            failure: outcome.failure,
        };

        if let (Some(path), Some(id)) = (&report.navigate_to, &report.conversation_id) {
            self.store
                .prepend_chat(ChatSummary::new_conversation(id.clone(), &request.text));
            self.store.select_chat(id.clone());
            debug!(%path, "new conversation created");
        }
        self.persist(&report);
        Ok(report)
    }

    async fn stream_answer(
        &mut self,
        established: Result<CompletionStream, ClientError>,
    ) -> SessionResult<Outcome> {
        let stream = match established {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "answer stream not established");
                return Ok(self.fatal(SendFailure::NotEstablished));
            }
        };

        let was_new = self.conversation_id.is_none();
        let Some(conversation) = self
            .conversation_id
            .clone()
            .or_else(|| stream.conversation_id.clone())
        else {
            warn!("backend did not announce an id for the new conversation");
            return Ok(self.fatal(SendFailure::MissingConversationId));
        };
        if was_new {
            self.adopt_conversation(&conversation);
        }

        let handle = self
            .assembler
            .begin(Role::Assistant, MessageKind::Plain, Some(conversation.clone()));
        let assistant_message = handle.id().clone();
        let mut fragments = stream.fragments;
        let mut failure = None;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => self.assembler.append(&handle, &fragment)?,
                Err(err) => {
                    warn!(%err, conversation = %conversation, "answer stream interrupted");
                    failure = Some(SendFailure::StreamInterrupted);
                    break;
                }
            }
        }
        if failure.is_some() {
            self.assembler.fail(handle, STREAM_FAILURE_NOTICE)?;
        } else {
            self.assembler.finish(handle)?;
        }

        Ok(Outcome {
            assistant_message,
            navigate_to: was_new.then(|| chat_route(&conversation)),
            conversation_id: Some(conversation),
            failure,
        })
    }

    async fn search(&mut self, request: &SendRequest) -> SessionResult<Outcome> {
        let payload = QuestionPayload::new(
            request.text.clone(),
            self.conversation_id.as_ref(),
            Tool::WebSearch,
        );
        let answer = match self.backend.search_web(payload).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(%err, "web search failed");
                return Ok(self.fatal(SendFailure::NotEstablished));
            }
        };

        let was_new = self.conversation_id.is_none();
        let conversation = self.conversation_id.clone().or(answer.chat_id);
        match (&conversation, was_new) {
            (Some(id), true) => self.adopt_conversation(id),
            (None, _) => warn!("web search answer carried no conversation id"),
            (Some(_), false) => {}
        }

        let assistant_message = self.assembler.push(Message::assistant_text(
            answer.answer,
            MessageKind::Tool(Tool::WebSearch),
            conversation.clone(),
        ));
        Ok(Outcome {
            assistant_message,
            navigate_to: conversation
                .as_ref()
                .filter(|_| was_new)
                .map(chat_route),
            conversation_id: conversation,
            failure: None,
        })
    }

    fn adopt_conversation(&mut self, conversation: &ConversationId) {
        info!(conversation = %conversation, "conversation assigned");
        self.conversation_id = Some(conversation.clone());
        self.assembler.set_conversation_id(conversation);
    }

    fn fatal(&mut self, failure: SendFailure) -> Outcome {
        let assistant_message = self.assembler.push(Message::assistant_text(
            SEND_FAILURE_NOTICE,
            MessageKind::Plain,
            self.conversation_id.clone(),
        ));
        Outcome {
            assistant_message,
            conversation_id: self.conversation_id.clone(),
            navigate_to: None,
            failure: Some(failure),
        }
    }

    fn persist(&self, report: &SendReport) {
        if !self.persist_messages {
            return;
        }
        let Some(conversation) = report.conversation_id.clone() else {
            return;
        };
        let snapshot = self.assembler.snapshot();
        for id in [&report.user_message, &report.assistant_message] {
            let Some(message) = snapshot.get(id) else {
                continue;
            };
            let record = MessageRecord::from(message.as_ref());
            let backend = Arc::clone(&self.backend);
            let conversation = conversation.clone();
            tokio::spawn(async move {
                if let Err(err) = backend.store_message(conversation, record).await {
                    warn!(%err, "failed to store message");
                }
            });
        }
    }
}

fn chat_route(conversation: &ConversationId) -> String {
    format!("/chat/{conversation}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;

    use crate::chat::ids::FileId;
    use crate::client::error::ClientResult;
    use crate::client::transport::BackendFuture;
    use crate::client::types::SearchAnswer;

    enum Answer {
        Refused,
        Stream {
            conversation_id: Option<&'static str>,
            items: Vec<Result<&'static str, &'static str>>,
        },
        Search {
            answer: &'static str,
            chat_id: Option<&'static str>,
        },
    }

    #[derive(Default)]
    struct FakeBackend {
        answers: Mutex<VecDeque<Answer>>,
        uploads: Mutex<VecDeque<Result<&'static str, &'static str>>>,
        calls: Mutex<Vec<(&'static str, QuestionPayload)>>,
        history: Mutex<Vec<MessageRecord>>,
        stored: Mutex<Vec<(ConversationId, MessageRecord)>>,
    }

    impl FakeBackend {
        fn answering(answers: Vec<Answer>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                ..Self::default()
            })
        }

        fn next(&self, endpoint: &'static str, payload: QuestionPayload) -> Answer {
            self.calls.lock().unwrap().push((endpoint, payload));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Answer::Refused)
        }

        fn stream(&self, endpoint: &'static str, payload: QuestionPayload) -> ClientResult<CompletionStream> {
            match self.next(endpoint, payload) {
                Answer::Stream {
                    conversation_id,
                    items,
                } => {
                    let items: Vec<ClientResult<String>> = items
                        .into_iter()
                        .map(|item| {
                            item.map(str::to_string)
                                .map_err(|err| ClientError::Stream(err.to_string()))
                        })
                        .collect();
                    Ok(CompletionStream {
                        conversation_id: conversation_id.map(ConversationId::new),
                        fragments: Box::pin(stream::iter(items)),
                    })
                }
                _ => Err(ClientError::Status {
                    status: 500,
                    body: String::new(),
                }),
            }
        }

        fn calls(&self) -> Vec<(&'static str, QuestionPayload)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChatBackend for FakeBackend {
        fn ask_question(
            &self,
            payload: QuestionPayload,
        ) -> BackendFuture<'_, ClientResult<CompletionStream>> {
            Box::pin(async move { self.stream("ask-question", payload) })
        }

        fn ask_file_question(
            &self,
            payload: QuestionPayload,
        ) -> BackendFuture<'_, ClientResult<CompletionStream>> {
            Box::pin(async move { self.stream("ask-file-question", payload) })
        }

        fn search_web(
            &self,
            payload: QuestionPayload,
        ) -> BackendFuture<'_, ClientResult<SearchAnswer>> {
            Box::pin(async move {
                match self.next("search-web", payload) {
                    Answer::Search { answer, chat_id } => Ok(SearchAnswer {
                        answer: answer.to_string(),
                        chat_id: chat_id.map(ConversationId::new),
                    }),
                    _ => Err(ClientError::Malformed("no search answer".to_string())),
                }
            })
        }

        fn upload_file(&self, _file: FileUpload) -> BackendFuture<'_, ClientResult<FileId>> {
            Box::pin(async move {
                match self.uploads.lock().unwrap().pop_front() {
                    Some(Ok(id)) => Ok(FileId::new(id)),
                    _ => Err(ClientError::Malformed("upload refused".to_string())),
                }
            })
        }

        fn store_message(
            &self,
            conversation: ConversationId,
            record: MessageRecord,
        ) -> BackendFuture<'_, ClientResult<()>> {
            Box::pin(async move {
                self.stored.lock().unwrap().push((conversation, record));
                Ok(())
            })
        }

        fn fetch_messages(
            &self,
            _conversation: ConversationId,
        ) -> BackendFuture<'_, ClientResult<Vec<MessageRecord>>> {
            Box::pin(async move { Ok(self.history.lock().unwrap().clone()) })
        }

        fn fetch_chats(&self) -> BackendFuture<'_, ClientResult<Vec<ChatSummary>>> {
            Box::pin(async move {
                Ok(vec![ChatSummary::new_conversation(
                    ConversationId::new("c1"),
                    "stored",
                )])
            })
        }
    }

    fn session(backend: &Arc<FakeBackend>) -> (ChatSession<FakeBackend>, Arc<AppStore>) {
        let store = Arc::new(AppStore::new());
        let session = ChatSession::new(
            Arc::clone(backend),
            Arc::clone(&store),
            &ChatClientConfig::default(),
        );
        (session, store)
    }

    fn file(name: &str) -> FileUpload {
        FileUpload {
            name: name.to_string(),
            mime: "text/plain".to_string(),
            bytes: b"data".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_new_conversation_streams_answer() {
        let backend = FakeBackend::answering(vec![Answer::Stream {
            conversation_id: Some("c1"),
            items: vec![Ok("Hel"), Ok("lo "), Ok("world")],
        }]);
        let (mut session, store) = session(&backend);

        let report = session.send(SendRequest::text("greet me")).await.unwrap();

        assert_eq!(report.failure, None);
        assert_eq!(report.navigate_to.as_deref(), Some("/chat/c1"));
        let snapshot = session.snapshot();
        let answer = snapshot.get(&report.assistant_message).unwrap();
        assert_eq!(answer.content, "Hello world");
        assert!(answer.complete);
        assert!(snapshot.is_new(&report.assistant_message));
        assert!(
            snapshot
                .messages
                .iter()
                .all(|m| m.conversation_id == Some(ConversationId::new("c1")))
        );

        let chats = store.chats();
        assert_eq!(chats.chats[0].title, "greet me");
        assert_eq!(chats.selected, Some(ConversationId::new("c1")));
        let calls = backend.calls();
        assert_eq!(calls[0].0, "ask-question");
        assert!(calls[0].1.first_message);
        assert!(!session.is_in_flight());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_content() {
        let backend = FakeBackend::answering(vec![Answer::Stream {
            conversation_id: Some("c1"),
            items: vec![Ok("Partial answer"), Err("connection reset"), Ok("lost")],
        }]);
        let (mut session, _store) = session(&backend);

        let report = session.send(SendRequest::text("q")).await.unwrap();

        assert_eq!(report.failure, Some(SendFailure::StreamInterrupted));
        let snapshot = session.snapshot();
        let answer = snapshot.get(&report.assistant_message).unwrap();
        assert!(answer.content.starts_with("Partial answer"));
        assert!(answer.content.ends_with(STREAM_FAILURE_NOTICE));
        assert!(answer.complete);
    }

    #[tokio::test]
    async fn test_missing_conversation_id_is_fatal_without_dangling_message() {
        let backend = FakeBackend::answering(vec![Answer::Stream {
            conversation_id: None,
            items: vec![Ok("ignored")],
        }]);
        let (mut session, store) = session(&backend);

        let report = session.send(SendRequest::text("q")).await.unwrap();

        assert_eq!(report.failure, Some(SendFailure::MissingConversationId));
        assert!(report.navigate_to.is_none());
        assert!(session.conversation_id().is_none());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.messages[0].is_user());
        assert_eq!(snapshot.messages[1].content, SEND_FAILURE_NOTICE);
        assert!(snapshot.messages.iter().all(|m| m.complete && !m.content.is_empty()));
        assert!(store.chats().chats.is_empty());
    }

    #[tokio::test]
    async fn test_refused_request_shows_notice() {
        let backend = FakeBackend::answering(vec![Answer::Refused]);
        let (mut session, _store) = session(&backend);

        let report = session.send(SendRequest::text("q")).await.unwrap();

        assert_eq!(report.failure, Some(SendFailure::NotEstablished));
        assert!(report.failure.is_some_and(SendFailure::is_fatal));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.last().unwrap().content, SEND_FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn test_existing_conversation_keeps_its_id() {
        let backend = FakeBackend::answering(vec![
            Answer::Stream {
                conversation_id: Some("c1"),
                items: vec![Ok("one")],
            },
            Answer::Stream {
                conversation_id: Some("other"),
                items: vec![Ok("two")],
            },
        ]);
        let (mut session, store) = session(&backend);

        session.send(SendRequest::text("first")).await.unwrap();
        let report = session.send(SendRequest::text("second")).await.unwrap();

        assert_eq!(report.conversation_id, Some(ConversationId::new("c1")));
        assert!(report.navigate_to.is_none());
        assert_eq!(store.chats().chats.len(), 1);
        let calls = backend.calls();
        assert_eq!(calls[1].1.chat_id, "c1");
        assert!(!calls[1].1.first_message);
    }

    #[tokio::test]
    async fn test_web_search_answer_arrives_whole() {
        let backend = FakeBackend::answering(vec![Answer::Search {
            answer: "It is sunny.",
            chat_id: Some("c7"),
        }]);
        let (mut session, store) = session(&backend);

        let report = session
            .send(SendRequest::with_tool("weather?", Tool::WebSearch))
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].0, "search-web");
        assert_eq!(calls[0].1.tool, "WEB SEARCH");
        let snapshot = session.snapshot();
        let answer = snapshot.get(&report.assistant_message).unwrap();
        assert_eq!(answer.content, "It is sunny.");
        assert_eq!(answer.kind, MessageKind::Tool(Tool::WebSearch));
        assert!(snapshot.is_new(&report.assistant_message));
        assert_eq!(
            snapshot.get(&report.user_message).unwrap().kind,
            MessageKind::Tool(Tool::WebSearch)
        );
        assert_eq!(report.navigate_to.as_deref(), Some("/chat/c7"));
        assert_eq!(store.chats().chats[0].id, ConversationId::new("c7"));
    }

    #[tokio::test]
    async fn test_failed_upload_does_not_abort_send() {
        let backend = FakeBackend::answering(vec![Answer::Stream {
            conversation_id: Some("c1"),
            items: vec![Ok("summary")],
        }]);
        backend.uploads.lock().unwrap().extend([Ok("f1"), Err("too big")]);
        let (mut session, _store) = session(&backend);

        assert_eq!(session.attach(file("a.txt")).await, UploadStatus::Done);
        assert_eq!(session.attach(file("b.txt")).await, UploadStatus::Failed);
        let report = session.send(SendRequest::text("summarize")).await.unwrap();

        assert_eq!(report.failure, None);
        let calls = backend.calls();
        assert_eq!(calls[0].0, "ask-file-question");
        let files = calls[0].1.files.clone().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, FileId::new("f1"));
        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.get(&report.user_message).unwrap().kind,
            MessageKind::WithAttachments(vec!["a.txt".to_string(), "b.txt".to_string()])
        );
        assert!(session.attachments().is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let backend = FakeBackend::answering(Vec::new());
        let (mut session, _store) = session(&backend);
        assert!(matches!(
            session.send(SendRequest::text("   ")).await,
            Err(SessionError::EmptyQuestion)
        ));
        assert!(session.snapshot().messages.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_not_flagged_new() {
        let backend = FakeBackend::answering(Vec::new());
        backend.history.lock().unwrap().extend([
            MessageRecord::from(&Message::user("q", MessageKind::Plain, None)),
            MessageRecord::from(&Message::assistant_text("a", MessageKind::Plain, None)),
        ]);
        let (mut session, store) = session(&backend);

        let count = session.load_history(ConversationId::new("c3")).await.unwrap();

        assert_eq!(count, 2);
        assert!(session.snapshot().new_ids.is_empty());
        assert_eq!(session.conversation_id(), Some(&ConversationId::new("c3")));
        assert_eq!(store.chats().selected, Some(ConversationId::new("c3")));
    }

    #[tokio::test]
    async fn test_refresh_chats_replaces_list() {
        let backend = FakeBackend::answering(Vec::new());
        let (session, store) = session(&backend);
        assert_eq!(session.refresh_chats().await.unwrap(), 1);
        assert_eq!(store.chats().chats[0].title, "stored");
    }

    #[tokio::test]
    async fn test_persisted_messages_are_stored() {
        let backend = FakeBackend::answering(vec![Answer::Stream {
            conversation_id: Some("c1"),
            items: vec![Ok("hi")],
        }]);
        let store = Arc::new(AppStore::new());
        let config = ChatClientConfig::default().with_persist_messages(true);
        let mut session = ChatSession::new(Arc::clone(&backend), store, &config);

        session.send(SendRequest::text("q")).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let stored = backend.stored.lock().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|(id, _)| id.as_str() == "c1"));
    }
}
