use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::context::Conversation;
use crate::error::ChatError;
use crate::llm::Fragment;

/// Stored when the model asked for a tool before producing any text.
pub const TOOL_ATTEMPT_MESSAGE: &str = "*(Model attempted to call a tool)*";

/// Stored when the stream ends without any text.
pub const NO_RESPONSE_MESSAGE: &str = "*(No response received from model. Check if 'Enable Tools' is causing this or if the model is compatible.)*";

/// Text fragments between writes of the partial reply.
pub const FLUSH_EVERY: usize = 5;

/// Display updates emitted while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Full reply text so far.
    Partial(String),
    /// The model asked for a tool; carries the tool name.
    ToolAttempted(String),
    /// Final reply text.
    Complete(String),
    Error(String),
}

/// How a streamed reply ended.
#[derive(Debug)]
pub enum StreamOutcome {
    Completed(String),
    /// Nothing came back; the fallback message was stored instead.
    CompletedEmpty,
    /// The stream broke off. `partial` is whatever text had arrived, and has
    /// already been written into the reply message.
    Failed { partial: String, error: ChatError },
}

impl StreamOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StreamOutcome::Failed { .. })
    }
}

enum Next {
    Item(Option<Result<Fragment, ChatError>>),
    Cancelled,
    // Cancel sender dropped without firing.
    Detached,
}

/// Drains a fragment stream into an assistant message on the conversation.
///
/// The reply message is appended before the first fragment is read, so a
/// crash mid-stream leaves the partial text in place. It is rewritten every
/// [`FLUSH_EVERY`] text fragments and once more at the end.
pub struct StreamConsumer {
    tools_enabled: bool,
    flush_every: usize,
}

impl StreamConsumer {
    pub fn new(tools_enabled: bool) -> Self {
        Self {
            tools_enabled,
            flush_every: FLUSH_EVERY,
        }
    }

    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = n.max(1);
        self
    }

    /// Consume `stream` until it ends, fails or `cancel` fires.
    ///
    /// Never removes the reply message, even on failure; dropping an empty
    /// reply is left to the caller.
    pub async fn consume<S>(
        &self,
        conversation: &mut Conversation,
        mut stream: S,
        events: &mpsc::UnboundedSender<TurnEvent>,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) -> StreamOutcome
    where
        S: Stream<Item = Result<Fragment, ChatError>> + Unpin,
    {
        let anchor = conversation.push_placeholder();
        let mut buffer = String::new();
        let mut text_fragments = 0usize;

        loop {
            let next = match cancel.as_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    signal = rx => if signal.is_ok() { Next::Cancelled } else { Next::Detached },
                    item = stream.next() => Next::Item(item),
                },
                None => Next::Item(stream.next().await),
            };

            let fragment = match next {
                Next::Item(Some(Ok(fragment))) => fragment,
                Next::Item(Some(Err(error))) => {
                    return self.fail(conversation, anchor, buffer, error, events);
                }
                Next::Item(None) => break,
                Next::Cancelled => {
                    tracing::info!("Generation cancelled after {} fragments", text_fragments);
                    return self.fail(conversation, anchor, buffer, ChatError::Cancelled, events);
                }
                Next::Detached => {
                    cancel = None;
                    continue;
                }
            };

            if let Some(delta) = fragment.text_delta() {
                buffer.push_str(delta);
                text_fragments += 1;
                if text_fragments % self.flush_every == 0 {
                    conversation.set_content(anchor, buffer.clone());
                    let _ = events.send(TurnEvent::Partial(buffer.clone()));
                }
            }

            if self.tools_enabled {
                if let Some(tool) = fragment.tool_call.as_deref() {
                    tracing::info!("Model requested tool {}", tool);
                    if buffer.is_empty() {
                        buffer.push_str(TOOL_ATTEMPT_MESSAGE);
                        conversation.set_content(anchor, buffer.clone());
                        let _ = events.send(TurnEvent::ToolAttempted(tool.to_string()));
                    }
                }
            }
        }

        if buffer.is_empty() {
            tracing::warn!("Stream ended without any text");
            conversation.set_content(anchor, NO_RESPONSE_MESSAGE);
            let _ = events.send(TurnEvent::Complete(NO_RESPONSE_MESSAGE.to_string()));
            return StreamOutcome::CompletedEmpty;
        }

        // Final write so the throttled flushes never leave a truncated reply.
        conversation.set_content(anchor, buffer.clone());
        let _ = events.send(TurnEvent::Complete(buffer.clone()));
        StreamOutcome::Completed(buffer)
    }

    fn fail(
        &self,
        conversation: &mut Conversation,
        anchor: usize,
        partial: String,
        error: ChatError,
        events: &mpsc::UnboundedSender<TurnEvent>,
    ) -> StreamOutcome {
        if !partial.is_empty() {
            conversation.set_content(anchor, partial.clone());
        }
        tracing::warn!("Stream failed with {} chars received: {}", partial.len(), error);
        let _ = events.send(TurnEvent::Error(error.to_string()));
        StreamOutcome::Failed { partial, error }
    }
}
