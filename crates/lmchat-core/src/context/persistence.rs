use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::ChatError;
use crate::llm::Message;

/// Metadata about a saved conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMetadata {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
}

/// A complete saved conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConversation {
    pub metadata: ConversationMetadata,
    pub messages: Vec<Message>,
}

/// Where finished turns are kept. Saving an id that already exists replaces
/// the earlier version.
pub trait HistoryStore: Send + Sync {
    fn save(&self, id: &str, messages: &[Message], title: &str) -> Result<(), ChatError>;

    /// Fails with [`ChatError::NotFound`] for an unknown id.
    fn load(&self, id: &str) -> Result<SavedConversation, ChatError>;

    /// Saved conversations, most recently updated first.
    fn list_all(&self) -> Result<Vec<ConversationMetadata>, ChatError>;

    /// Deleting an unknown id is not an error.
    fn delete(&self, id: &str) -> Result<(), ChatError>;
}

/// Current time as RFC 3339 with milliseconds
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the on-disk form, keeping `created_at` from an earlier save
fn build_saved(
    id: &str,
    messages: &[Message],
    title: &str,
    created_at: Option<String>,
) -> SavedConversation {
    let now = timestamp();
    SavedConversation {
        metadata: ConversationMetadata {
            id: id.to_string(),
            title: title.to_string(),
            created_at: created_at.unwrap_or_else(|| now.clone()),
            updated_at: now,
            message_count: messages.len(),
        },
        messages: messages.to_vec(),
    }
}

/// Index of all conversations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConversationIndex {
    conversations: Vec<ConversationMetadata>,
}

/// Keeps conversations as JSON files on disk, one per id, plus an index.
pub struct FileHistoryStore {
    base_dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a store in the given directory, creating it if needed.
    pub fn with_dir(base_dir: PathBuf) -> Result<Self, ChatError> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            ChatError::Persistence(format!("Failed to create history directory: {}", e))
        })?;

        Ok(Self { base_dir })
    }

    /// Get the directory conversations are stored in
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get path to the index file
    fn index_path(&self) -> PathBuf {
        self.base_dir.join("index.json")
    }

    /// Get path to a conversation file
    fn conversation_path(&self, id: &str) -> Result<PathBuf, ChatError> {
        // Ids become file names; keep them from escaping the directory.
        let valid = !id.is_empty()
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ChatError::Persistence(format!("Invalid conversation id: {:?}", id)));
        }
        Ok(self.base_dir.join(format!("{}.json", id)))
    }

    /// Load the index, empty if it does not exist yet
    fn load_index(&self) -> Result<ConversationIndex, ChatError> {
        let path = self.index_path();

        if !path.exists() {
            return Ok(ConversationIndex::default());
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            ChatError::Persistence(format!("Failed to read index file: {}", e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ChatError::Persistence(format!("Failed to parse index file: {}", e))
        })
    }

    /// Save the index
    fn save_index(&self, index: &ConversationIndex) -> Result<(), ChatError> {
        let contents = serde_json::to_string_pretty(index)?;
        self.write_atomic(self.index_path(), contents)
    }

    /// Write through a temp file and rename over the target
    fn write_atomic(&self, path: PathBuf, contents: String) -> Result<(), ChatError> {
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|e| {
            ChatError::Persistence(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            ChatError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
        })
    }
}

impl HistoryStore for FileHistoryStore {
    fn save(&self, id: &str, messages: &[Message], title: &str) -> Result<(), ChatError> {
        let path = self.conversation_path(id)?;
        let mut index = self.load_index()?;
        let created_at = index
            .conversations
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.created_at.clone());

        let conversation = build_saved(id, messages, title, created_at);
        let contents = serde_json::to_string_pretty(&conversation)?;
        self.write_atomic(path, contents)?;

        index.conversations.retain(|m| m.id != id);
        index.conversations.insert(0, conversation.metadata);
        // Stable sort keeps the entry just inserted ahead of any tie.
        index.conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.save_index(&index)?;

        tracing::debug!("Saved conversation {} ({} messages)", id, messages.len());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<SavedConversation, ChatError> {
        let path = self.conversation_path(id)?;

        if !path.exists() {
            return Err(ChatError::NotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            ChatError::Persistence(format!("Failed to read conversation file: {}", e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ChatError::Persistence(format!("Failed to parse conversation file: {}", e))
        })
    }

    fn list_all(&self) -> Result<Vec<ConversationMetadata>, ChatError> {
        Ok(self.load_index()?.conversations)
    }

    fn delete(&self, id: &str) -> Result<(), ChatError> {
        let path = self.conversation_path(id)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                ChatError::Persistence(format!("Failed to delete conversation file: {}", e))
            })?;
        }

        let mut index = self.load_index()?;
        index.conversations.retain(|m| m.id != id);
        self.save_index(&index)
    }
}

/// Keeps conversations in memory only. Useful for tests and throwaway
/// sessions.
#[derive(Default)]
pub struct MemoryHistoryStore {
    // Most recently saved first.
    conversations: Mutex<Vec<SavedConversation>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SavedConversation>>, ChatError> {
        self.conversations
            .lock()
            .map_err(|_| ChatError::Persistence("history store lock poisoned".into()))
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save(&self, id: &str, messages: &[Message], title: &str) -> Result<(), ChatError> {
        let mut conversations = self.lock()?;
        let created_at = conversations
            .iter()
            .find(|c| c.metadata.id == id)
            .map(|c| c.metadata.created_at.clone());
        conversations.retain(|c| c.metadata.id != id);
        conversations.insert(0, build_saved(id, messages, title, created_at));
        Ok(())
    }

    fn load(&self, id: &str) -> Result<SavedConversation, ChatError> {
        self.lock()?
            .iter()
            .find(|c| c.metadata.id == id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    fn list_all(&self) -> Result<Vec<ConversationMetadata>, ChatError> {
        Ok(self.lock()?.iter().map(|c| c.metadata.clone()).collect())
    }

    fn delete(&self, id: &str) -> Result<(), ChatError> {
        self.lock()?.retain(|c| c.metadata.id != id);
        Ok(())
    }
}
