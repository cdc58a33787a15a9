mod builder;
pub mod extract;
mod history;
pub mod persistence;
mod store;

pub use builder::PayloadBuilder;
pub use extract::{ContextExtractor, FsExtractor};
pub use history::{derive_title, Conversation, NEW_CHAT_TITLE};
pub use persistence::{
    ConversationMetadata, FileHistoryStore, HistoryStore, MemoryHistoryStore, SavedConversation,
};
pub use store::{Attached, ContextStore, ImageAttachment};
