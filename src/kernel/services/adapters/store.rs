//! File-backed conversation store: one pretty-printed JSON document per
//! conversation under a single directory.

use std::path::{Path, PathBuf};

use crate::kernel::chat::Conversation;
use crate::kernel::services::ports::{ConversationStore, StoreError};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonConversationStore {
    dir: PathBuf,
}

impl JsonConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> PathBuf {
        let name: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.{EXTENSION}"))
    }
}

impl ConversationStore for JsonConversationStore {
    fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_for(&conversation.id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(conversation)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.file_for(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Unreadable or malformed files are skipped with a warning. Results are
    /// ordered oldest update first.
    fn load_all(&self) -> Result<Vec<Conversation>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut conversations = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let parsed = std::fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|data| serde_json::from_slice::<Conversation>(&data).map_err(Into::into));
            match parsed {
                Ok(conversation) => conversations.push(conversation),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping conversation file"
                    );
                }
            }
        }

        conversations.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(conversations)
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/store.rs"]
mod tests;
