use super::*;
use crate::kernel::chat::{Message, Role};
use chrono::{Duration, Utc};
use tempfile::tempdir;

fn conversation(title: &str, age_secs: i64) -> Conversation {
    let mut conversation = Conversation::new();
    conversation.title = title.to_string();
    conversation.updated_at = Utc::now() - Duration::seconds(age_secs);
    conversation.messages.push(Message::user("hello"));
    conversation
}

#[test]
fn saved_conversations_load_oldest_first() {
    let dir = tempdir().unwrap();
    let store = JsonConversationStore::new(dir.path().join("conversations"));

    let newer = conversation("newer", 5);
    let older = conversation("older", 60);
    store.save(&newer).unwrap();
    store.save(&older).unwrap();

    let loaded = store.load_all().unwrap();
    let titles: Vec<_> = loaded.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["older", "newer"]);
    assert_eq!(loaded[1].messages[0].role, Role::User);
    assert_eq!(loaded[1].messages[0].content, "hello");
}

#[test]
fn saving_twice_overwrites_the_same_file() {
    let dir = tempdir().unwrap();
    let store = JsonConversationStore::new(dir.path());

    let mut conv = conversation("first", 0);
    store.save(&conv).unwrap();
    conv.title = "second".to_string();
    store.save(&conv).unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].title, "second");
    assert!(!dir.path().join(format!("{}.json.tmp", conv.id)).exists());
}

#[test]
fn delete_removes_file_and_ignores_unknown_ids() {
    let dir = tempdir().unwrap();
    let store = JsonConversationStore::new(dir.path());
    let conv = conversation("bye", 0);
    store.save(&conv).unwrap();

    store.delete(&conv.id).unwrap();
    store.delete(&conv.id).unwrap();
    store.delete("never-saved").unwrap();
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn missing_directory_loads_nothing_and_bad_files_are_skipped() {
    let dir = tempdir().unwrap();
    let store = JsonConversationStore::new(dir.path().join("absent"));
    assert!(store.load_all().unwrap().is_empty());

    let store = JsonConversationStore::new(dir.path());
    store.save(&conversation("good", 0)).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].title, "good");
}

#[test]
fn ids_are_sanitized_into_file_names() {
    let dir = tempdir().unwrap();
    let store = JsonConversationStore::new(dir.path());
    assert_eq!(store.file_for("../etc/passwd"), dir.path().join("___etc_passwd.json"));
}
