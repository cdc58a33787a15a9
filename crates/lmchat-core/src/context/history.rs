use crate::context::persistence::SavedConversation;
use crate::llm::{Content, Message, Role};

/// Title a conversation carries until its first reply arrives.
pub const NEW_CHAT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 30;

/// Title for a conversation opening with `text`: the first 30 characters,
/// with `...` appended when something was cut.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// The canonical message list of one conversation, as it is saved.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    title: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// A fresh conversation seeded with a system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn from_saved(saved: SavedConversation) -> Self {
        Self {
            id: saved.metadata.id,
            title: saved.metadata.title,
            messages: saved.messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text.into()));
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append an empty assistant message to be filled while streaming and
    /// return its index.
    pub fn push_placeholder(&mut self) -> usize {
        self.messages.push(Message::assistant(String::new()));
        self.messages.len() - 1
    }

    /// Overwrite the text of the message at `index`.
    pub fn set_content(&mut self, index: usize, text: impl Into<String>) {
        if let Some(message) = self.messages.get_mut(index) {
            message.content = Content::Text(text.into());
        }
    }

    /// Drop a trailing assistant message that never received any text.
    /// Returns whether one was removed.
    pub fn discard_empty_placeholder(&mut self) -> bool {
        let is_empty_reply = self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty());
        if is_empty_reply {
            self.messages.pop();
        }
        is_empty_reply
    }

    pub fn has_default_title(&self) -> bool {
        self.title == NEW_CHAT_TITLE
    }

    /// Name the conversation after its first user message. Only applies while
    /// the title is still the default; returns whether the title changed.
    pub fn assign_title(&mut self) -> bool {
        if !self.has_default_title() {
            return false;
        }
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return false;
        };
        self.title = derive_title(first.content.leading_text());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContentBlock;

    #[test]
    fn test_new_conversation_is_seeded() {
        let conv = Conversation::new("sys");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert!(conv.has_default_title());
        assert_ne!(conv.id(), Conversation::new("sys").id());
    }

    #[test]
    fn test_derive_title_truncates_long_text() {
        let title = derive_title(&"x".repeat(45));
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));

        assert_eq!(derive_title("0123456789"), "0123456789");
        assert_eq!(derive_title(&"y".repeat(30)), "y".repeat(30));
    }

    #[test]
    fn test_derive_title_counts_characters_not_bytes() {
        let text = "é".repeat(31);
        assert_eq!(derive_title(&text), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn test_title_assigned_once() {
        let mut conv = Conversation::new("sys");
        assert!(!conv.assign_title());
        assert!(conv.has_default_title());

        conv.add_user_message("first question");
        conv.add_user_message("second question");
        assert!(conv.assign_title());
        assert_eq!(conv.title(), "first question");

        assert!(!conv.assign_title());
        assert_eq!(conv.title(), "first question");
    }

    #[test]
    fn test_title_from_multimodal_message() {
        let mut conv = Conversation::new("sys");
        conv.add_message(Message::user(Content::Blocks(vec![
            ContentBlock::image("data:image/png;base64,AA"),
            ContentBlock::text("what is this"),
        ])));
        conv.assign_title();
        assert_eq!(conv.title(), "what is this");

        let mut conv = Conversation::new("sys");
        conv.add_message(Message::user(Content::Blocks(vec![ContentBlock::image(
            "data:image/png;base64,AA",
        )])));
        conv.assign_title();
        assert_eq!(conv.title(), "");
    }

    #[test]
    fn test_discard_only_empty_assistant() {
        let mut conv = Conversation::new("sys");
        conv.add_user_message("hi");
        let idx = conv.push_placeholder();
        assert!(conv.discard_empty_placeholder());
        assert_eq!(conv.len(), 2);

        let idx2 = conv.push_placeholder();
        assert_eq!(idx, idx2);
        conv.set_content(idx2, "partial");
        assert!(!conv.discard_empty_placeholder());
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last_message().and_then(Message::text), Some("partial"));
    }
}
