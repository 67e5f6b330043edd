use super::*;

#[test]
fn empty_document_uses_defaults() {
    let settings: Settings = serde_json::from_str("{}").unwrap();

    assert_eq!(settings.ai.base_url, "http://127.0.0.1:8000");
    assert_eq!(settings.ai.completion_path, "/api/completion");
    assert_eq!(settings.ai.request_timeout_ms, 10_000);
    assert!(settings.plugins.is_empty());
    assert_eq!(settings.completion_config().debounce, Duration::from_millis(300));
    assert_eq!(settings.chat_config().persist_debounce, Duration::from_millis(500));
    assert_eq!(settings.runtime_config().content_debounce, Duration::from_millis(150));
}

#[test]
fn partial_sections_keep_remaining_defaults() {
    let settings: Settings = serde_json::from_str(
        r#"{
            "ai": { "api_key": "secret" },
            "completion": { "debounce_ms": 80, "max_chars": 120 },
            "plugins": [{ "id": "chat-bridge", "enabled": false }, { "id": "inline-completion" }]
        }"#,
    )
    .unwrap();

    assert_eq!(settings.ai.api_key.as_deref(), Some("secret"));
    assert_eq!(settings.ai.chat_path, "/api/chat");

    let completion = settings.completion_config();
    assert_eq!(completion.debounce, Duration::from_millis(80));
    assert_eq!(completion.max_chars, 120);
    assert_eq!(completion.max_lines_before, 50);

    assert_eq!(
        settings.plugins,
        vec![
            PluginOverride {
                id: "chat-bridge".to_string(),
                enabled: false,
            },
            PluginOverride {
                id: "inline-completion".to_string(),
                enabled: true,
            },
        ]
    );
}

#[test]
fn default_settings_round_trip_without_api_key() {
    let text = serde_json::to_string(&Settings::default()).unwrap();
    assert!(!text.contains("api_key"));
    let back: Settings = serde_json::from_str(&text).unwrap();
    assert_eq!(back.ai.providers_path, "/api/providers");
}
