use crate::config::TurnConfig;
use crate::context::ContextStore;
use crate::llm::{builtin_tools, ChatRequest, Content, ContentBlock, Message, Role};

/// Assembles the messages sent for one turn from the stored history, the
/// attached context and the turn configuration.
///
/// The stored history is only read. Anything that has to change for the
/// request (image blocks, a merged system prompt) is done on copies, so the
/// saved conversation keeps its plain-text form.
pub struct PayloadBuilder<'a> {
    config: &'a TurnConfig,
    context: &'a ContextStore,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(config: &'a TurnConfig, context: &'a ContextStore) -> Self {
        Self { config, context }
    }

    /// The configured system prompt followed by every attached text file.
    pub fn system_text(&self) -> String {
        let mut text = self.config.system_prompt.clone();

        if self.context.has_files() {
            let sections: Vec<String> = self
                .context
                .files()
                .map(|(name, content)| format!("--- File: {} ---\n{}", name, content))
                .collect();
            text.push_str("\n\nContext from attached files:\n");
            text.push_str(&sections.join("\n\n"));
        }

        text
    }

    /// The last `history_limit` non-system messages, with images merged into
    /// a trailing plain-text user message. The window never drops below one
    /// message, so the newest user message is always sent.
    pub fn windowed_history(&self, history: &[Message]) -> Vec<Message> {
        let filtered: Vec<&Message> = history.iter().filter(|m| m.role != Role::System).collect();
        let start = filtered.len().saturating_sub(self.config.history_limit.max(1));
        let mut window: Vec<Message> = filtered[start..].iter().map(|m| (*m).clone()).collect();

        if self.context.has_images() {
            if let Some(last) = window.last_mut() {
                if last.role == Role::User {
                    if let Content::Text(text) = &last.content {
                        let mut blocks = vec![ContentBlock::text(text.clone())];
                        blocks.extend(
                            self.context
                                .images()
                                .map(|(_, image)| ContentBlock::image(image.data_uri())),
                        );
                        last.content = Content::Blocks(blocks);
                    }
                }
            }
        }

        window
    }

    /// Ordered messages to transmit.
    pub fn build(&self, history: &[Message]) -> Vec<Message> {
        let system_text = self.system_text();
        let mut window = self.windowed_history(history);

        if self.config.use_system_role {
            let mut messages = Vec::with_capacity(window.len() + 1);
            messages.push(Message::system(system_text));
            messages.extend(window);
            return messages;
        }

        // Compatibility mode: no system role, the prompt rides on the first
        // user message instead.
        let Some(first) = window.first_mut() else {
            return vec![Message::user(system_text)];
        };

        if first.role != Role::User {
            window.insert(0, Message::user(system_text));
            return window;
        }

        let prefix = format!("{}\n\n", system_text);
        first.content = match std::mem::take(&mut first.content) {
            Content::Text(text) => Content::Text(format!("{}{}", prefix, text)),
            Content::Blocks(blocks) => {
                let mut merged = Vec::with_capacity(blocks.len() + 1);
                merged.push(ContentBlock::text(prefix));
                merged.extend(blocks);
                Content::Blocks(merged)
            }
        };
        window
    }

    /// The full streaming request for this turn.
    pub fn build_request(&self, history: &[Message]) -> ChatRequest {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.build(history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
            tools: None,
        };

        if self.config.tools_enabled {
            request.with_tools(&builtin_tools())
        } else {
            request
        }
    }
}
