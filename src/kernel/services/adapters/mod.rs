//! Service adapters: OS/runtime specific implementations (IO/async).

pub mod http;
pub mod memory_editor;
pub mod paths;
pub mod settings;
pub mod store;

pub use http::{HttpAiClient, Utf8ChunkDecoder};
pub use memory_editor::{MemoryEditor, ANY_LANGUAGE};
pub use paths::{ensure_conversations_dir, ensure_log_dir, get_conversations_dir, get_log_dir};
pub use settings::{ensure_settings_file, get_settings_path, load_settings, load_settings_from};
pub use store::JsonConversationStore;
