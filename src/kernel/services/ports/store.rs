use thiserror::Error;

use crate::kernel::chat::Conversation;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable home for conversations. Calls are short and synchronous; the
/// conversation engine decides when to call them.
pub trait ConversationStore: Send + Sync {
    fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
    fn load_all(&self) -> Result<Vec<Conversation>, StoreError>;
}
