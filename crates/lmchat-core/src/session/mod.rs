mod stream;

pub use stream::{
    StreamConsumer, StreamOutcome, TurnEvent, FLUSH_EVERY, NO_RESPONSE_MESSAGE,
    TOOL_ATTEMPT_MESSAGE,
};

use tokio::sync::{mpsc, oneshot};

use crate::config::TurnConfig;
use crate::context::{ContextStore, Conversation, HistoryStore, PayloadBuilder};
use crate::error::ChatError;
use crate::llm::ChatTransport;

/// State of one user's chat: the active conversation, what is attached to
/// it, and the configuration used for the next turn.
///
/// Turns run one at a time; `run_turn` takes `&mut self` for its whole
/// duration, so nothing else can touch the conversation mid-stream.
pub struct Session {
    config: TurnConfig,
    conversation: Conversation,
    context: ContextStore,
}

impl Session {
    pub fn new(config: TurnConfig) -> Self {
        let conversation = Conversation::new(config.system_prompt.clone());
        Self {
            config,
            conversation,
            context: ContextStore::new(),
        }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Applies from the next turn on.
    pub fn set_config(&mut self, config: TurnConfig) {
        self.config = config;
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextStore {
        &mut self.context
    }

    /// Start over with an empty conversation and no attachments.
    pub fn new_conversation(&mut self) {
        self.conversation = Conversation::new(self.config.system_prompt.clone());
        self.context.clear();
    }

    /// Switch to a saved conversation. Attachments are not saved, so they are
    /// cleared. On error the current state is left as it was.
    pub fn load(&mut self, store: &dyn HistoryStore, id: &str) -> Result<(), ChatError> {
        let saved = store.load(id)?;
        self.conversation = Conversation::from_saved(saved);
        self.context.clear();
        tracing::debug!("Loaded conversation {}", id);
        Ok(())
    }

    /// Delete a saved conversation. Deleting the active one starts a new
    /// conversation.
    pub fn delete(&mut self, store: &dyn HistoryStore, id: &str) -> Result<(), ChatError> {
        store.delete(id)?;
        if self.conversation.id() == id {
            self.new_conversation();
        }
        Ok(())
    }

    /// Run one exchange: record the user's message, send the request, stream
    /// the reply into the conversation, then title and save it.
    ///
    /// Transport failures do not return `Err`; they come back as
    /// [`StreamOutcome::Failed`] after the failure policy has been applied.
    /// An empty reply is removed and nothing is saved. A reply with partial
    /// text is kept and saved like a finished one. `Err` is reserved for
    /// persistence failures.
    pub async fn run_turn(
        &mut self,
        transport: &dyn ChatTransport,
        store: &dyn HistoryStore,
        user_text: impl Into<String>,
        events: &mpsc::UnboundedSender<TurnEvent>,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<StreamOutcome, ChatError> {
        let config = self.config.clone();
        self.conversation.add_user_message(user_text);

        let request = PayloadBuilder::new(&config, &self.context)
            .build_request(self.conversation.messages());
        tracing::debug!(
            "Sending {} messages to {} ({} attachments)",
            request.messages.len(),
            request.model,
            self.context.len()
        );

        let stream = match transport.chat_stream(&request).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!("Failed to open stream: {}", error);
                let _ = events.send(TurnEvent::Error(error.to_string()));
                return Ok(StreamOutcome::Failed {
                    partial: String::new(),
                    error,
                });
            }
        };

        let outcome = StreamConsumer::new(config.tools_enabled)
            .consume(&mut self.conversation, stream, events, cancel)
            .await;

        if outcome.is_failed() && self.conversation.discard_empty_placeholder() {
            tracing::warn!("Discarded empty reply in {}", self.conversation.id());
            return Ok(outcome);
        }

        self.finish_turn(store)?;
        Ok(outcome)
    }

    fn finish_turn(&mut self, store: &dyn HistoryStore) -> Result<(), ChatError> {
        if self.conversation.assign_title() {
            tracing::info!("Conversation {} titled {:?}", self.conversation.id(), self.conversation.title());
        }
        store.save(
            self.conversation.id(),
            self.conversation.messages(),
            self.conversation.title(),
        )
    }
}
