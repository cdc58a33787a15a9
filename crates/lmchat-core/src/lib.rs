pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod session;

// Re-export key types
pub use config::{Settings, TurnConfig};
pub use context::{
    ContextStore, Conversation, FileHistoryStore, FsExtractor, HistoryStore, MemoryHistoryStore,
    PayloadBuilder,
};
pub use error::ChatError;
pub use llm::{ChatRequest, ChatTransport, Content, ContentBlock, Fragment, Message, Role};
pub use session::{Session, StreamConsumer, StreamOutcome, TurnEvent};
