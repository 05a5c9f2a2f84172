//! Backend abstraction consumed by the chat session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use crate::chat::ids::{ConversationId, FileId};
use crate::chat::message::MessageRecord;
use crate::client::decoder::Utf8StreamDecoder;
use crate::client::error::{ClientError, ClientResult};
use crate::client::types::{ChatSummary, FileUpload, QuestionPayload, SearchAnswer};

/// Boxed future type for backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decoded text fragments of a streamed answer, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// An established streamed answer.
pub struct CompletionStream {
    /// Conversation id announced out of band, if any.
    pub conversation_id: Option<ConversationId>,
    /// Text fragments.
    pub fragments: FragmentStream,
}

impl fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionStream")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

/// Operations the chat session needs from the backend.
pub trait ChatBackend: Send + Sync {
    /// Ask a question and stream the answer.
    ///
    /// # Errors
    /// Returns an error if the stream could not be established.
    fn ask_question(&self, payload: QuestionPayload)
    -> BackendFuture<'_, ClientResult<CompletionStream>>;

    /// Ask a question about uploaded files and stream the answer.
    ///
    /// # Errors
    /// Returns an error if the stream could not be established.
    fn ask_file_question(
        &self,
        payload: QuestionPayload,
    ) -> BackendFuture<'_, ClientResult<CompletionStream>>;

    /// Ask the web-search endpoint; the answer arrives whole.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn search_web(&self, payload: QuestionPayload) -> BackendFuture<'_, ClientResult<SearchAnswer>>;

    /// Upload one file and return its id.
    ///
    /// # Errors
    /// Returns an error if the upload fails.
    fn upload_file(&self, file: FileUpload) -> BackendFuture<'_, ClientResult<FileId>>;

    /// Store a message in a conversation's history.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn store_message(
        &self,
        conversation: ConversationId,
        record: MessageRecord,
    ) -> BackendFuture<'_, ClientResult<()>>;

    /// Load a conversation's stored messages, oldest first.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn fetch_messages(
        &self,
        conversation: ConversationId,
    ) -> BackendFuture<'_, ClientResult<Vec<MessageRecord>>>;

    /// Load the conversation list.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn fetch_chats(&self) -> BackendFuture<'_, ClientResult<Vec<ChatSummary>>>;
}

/// Turn a byte stream into text fragments.
///
/// Chunks that only carry part of a character yield nothing until the
/// character completes. A read error is yielded once as
/// [`ClientError::Stream`] and ends the stream.
pub fn decode_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = (Box::pin(bytes), Utf8StreamDecoder::new(), false);
    Box::pin(stream::unfold(
        state,
        |(mut inner, mut decoder, done)| async move {
            if done {
                return None;
            }
            loop {
                match inner.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.decode(chunk.as_ref());
                        if !text.is_empty() {
                            return Some((Ok(text), (inner, decoder, false)));
                        }
                    }
                    Some(Err(err)) => {
                        let err = ClientError::Stream(err.to_string());
                        return Some((Err(err), (inner, decoder, true)));
                    }
                    None => {
                        let tail = decoder.finish();
                        if tail.is_empty() {
                            return None;
                        }
                        return Some((Ok(tail), (inner, decoder, true)));
                    }
                }
            }
        },
    ))
}
