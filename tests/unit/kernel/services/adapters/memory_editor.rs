use super::*;
use crate::kernel::services::ports::{HoverProvider, MarkerSeverity};
use async_trait::async_trait;
use parking_lot::Mutex as PlMutex;
use std::sync::atomic::AtomicUsize;

struct FixedSuggestion(&'static str);

#[async_trait]
impl InlineCompletionProvider for FixedSuggestion {
    async fn provide_inline_completions(
        &self,
        _query: InlineCompletionQuery,
        _cancel: CancellationToken,
    ) -> Option<String> {
        Some(self.0.to_string())
    }
}

struct NoHover;

impl HoverProvider for NoHover {
    fn provide_hover(&self, _content: &str, _position: Position) -> Option<String> {
        None
    }
}

fn pos(line: u32, column: u32) -> Position {
    Position::new(line, column)
}

#[test]
fn replace_range_moves_cursor_and_fires_listeners_in_order() {
    let editor = MemoryEditor::new("hello world\n", "plaintext");
    let log = Arc::new(PlMutex::new(Vec::<String>::new()));

    let l = log.clone();
    editor.on_content_change(Arc::new(move || l.lock().push("content".to_string())));
    let l = log.clone();
    editor.on_cursor_change(Arc::new(move |p: Position| {
        l.lock().push(format!("cursor {}:{}", p.line, p.column))
    }));

    editor.set_selection(Some(Range::new(pos(0, 6), pos(0, 11))));
    editor.replace_range(Range::new(pos(0, 6), pos(0, 11)), "rope\nend");

    assert_eq!(editor.content(), "hello rope\nend\n");
    assert_eq!(editor.cursor(), pos(1, 3));
    assert_eq!(editor.selection(), None);
    assert_eq!(*log.lock(), vec!["content", "cursor 1:3"]);
}

#[test]
fn cursor_and_selection_are_clamped_to_the_document() {
    let editor = MemoryEditor::new("ab\ncd", "plaintext");

    editor.set_cursor(pos(7, 9));
    assert_eq!(editor.cursor(), pos(1, 2));

    editor.set_cursor(pos(0, 40));
    assert_eq!(editor.cursor(), pos(0, 2));

    editor.set_selection(Some(Range::new(pos(0, 1), pos(5, 5))));
    assert_eq!(editor.selection(), Some(Range::new(pos(0, 1), pos(1, 2))));

    editor.set_content("x");
    assert_eq!(editor.cursor(), pos(0, 1));
    assert_eq!(editor.selection(), None);
}

#[test]
fn listeners_may_read_the_editor_while_firing() {
    let editor = Arc::new(MemoryEditor::new("", "rust"));
    let seen = Arc::new(PlMutex::new(String::new()));

    let weak = Arc::downgrade(&editor);
    let s = seen.clone();
    editor.on_content_change(Arc::new(move || {
        if let Some(editor) = weak.upgrade() {
            *s.lock() = editor.content();
        }
    }));

    editor.set_content("fn main() {}");
    assert_eq!(*seen.lock(), "fn main() {}");
}

#[test]
fn release_drops_registrations_and_decorations() {
    let editor = MemoryEditor::new("text", "rust");
    let runs = Arc::new(AtomicUsize::new(0));

    let r = runs.clone();
    let action = editor.add_action(EditorAction {
        id: "demo.run".to_string(),
        label: "Run".to_string(),
        keybinding: None,
        run: Arc::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }),
    });
    editor.register_provider("rust", LanguageProvider::Hover(Arc::new(NoHover)));
    let decorations = editor.delta_decorations(
        &[],
        vec![Decoration {
            range: Range::new(pos(0, 0), pos(0, 2)),
            class_name: "ghost".to_string(),
            hover_message: None,
        }],
    );

    assert!(editor.run_action("demo.run"));
    assert!(!editor.run_action("demo.missing"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(editor.provider_count(ProviderKind::Hover), 1);
    assert_eq!(editor.decorations().len(), 1);

    editor.release(action);
    editor.release(decorations[0]);
    editor.release(SurfaceHandle(999));

    assert!(editor.action_ids().is_empty());
    assert!(editor.decorations().is_empty());
    assert_eq!(editor.registration_count(), 1);
}

#[test]
fn delta_decorations_replaces_old_handles() {
    let editor = MemoryEditor::new("abc", "rust");
    let decoration = |class: &str| Decoration {
        range: Range::new(pos(0, 0), pos(0, 1)),
        class_name: class.to_string(),
        hover_message: None,
    };

    let first = editor.delta_decorations(&[], vec![decoration("a"), decoration("b")]);
    let second = editor.delta_decorations(&first[..1], vec![decoration("c")]);

    assert_eq!(second.len(), 1);
    let classes: Vec<_> = editor.decorations().into_iter().map(|d| d.class_name).collect();
    assert_eq!(classes, vec!["b", "c"]);
}

#[test]
fn markers_are_grouped_by_owner_and_cleared_with_empty_list() {
    let editor = MemoryEditor::new("abc", "rust");
    let marker = Marker {
        range: Range::new(pos(0, 0), pos(0, 3)),
        severity: MarkerSeverity::Warning,
        message: "unused".to_string(),
        source: Some("lint".to_string()),
    };

    editor.set_markers("lint", vec![marker.clone()]);
    assert_eq!(editor.markers("lint"), vec![marker]);
    assert!(editor.markers("other").is_empty());

    editor.set_markers("lint", Vec::new());
    assert!(editor.markers("lint").is_empty());
}

#[tokio::test]
async fn inline_requests_use_language_then_wildcard_providers() {
    let editor = MemoryEditor::new("let", "rust");
    assert_eq!(editor.request_inline_completion(CancellationToken::new()).await, None);

    editor.register_provider(
        "python",
        LanguageProvider::InlineCompletion(Arc::new(FixedSuggestion("py"))),
    );
    editor.register_provider(
        ANY_LANGUAGE,
        LanguageProvider::InlineCompletion(Arc::new(FixedSuggestion("any"))),
    );
    editor.register_provider(
        "rust",
        LanguageProvider::InlineCompletion(Arc::new(FixedSuggestion("rs"))),
    );

    assert_eq!(editor.inline_completion_providers("rust").len(), 2);
    assert_eq!(
        editor.request_inline_completion(CancellationToken::new()).await.as_deref(),
        Some("any")
    );

    editor.set_language("go");
    assert_eq!(editor.inline_completion_providers("go").len(), 1);
}

#[test]
fn open_detects_language_and_keeps_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.py");
    std::fs::write(&path, "print('hi')\n").unwrap();

    let editor = MemoryEditor::open(&path).unwrap();
    assert_eq!(editor.language(), "python");
    assert_eq!(editor.file_path(), Some(path));
    assert_eq!(editor.content(), "print('hi')\n");

    assert!(MemoryEditor::open(&dir.path().join("absent.rs")).is_err());
}

#[test]
fn global_registrations_are_recorded() {
    let editor = MemoryEditor::new("", "plaintext");
    editor.register_language("zig", &[".zig"]);
    editor.define_theme("dusk", serde_json::json!({ "base": "vs-dark" }));
    editor.notify(NotificationLevel::Warning, "careful");

    assert_eq!(editor.language_extensions("zig"), Some(vec![".zig".to_string()]));
    assert_eq!(editor.theme("dusk").unwrap()["base"], "vs-dark");
    assert_eq!(
        editor.notifications(),
        vec![(NotificationLevel::Warning, "careful".to_string())]
    );
}
