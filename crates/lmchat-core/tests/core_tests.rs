use lmchat_core::context::{Attached, ImageAttachment};
use lmchat_core::*;
use tempfile::TempDir;

fn config(use_system_role: bool, history_limit: usize) -> TurnConfig {
    TurnConfig {
        system_prompt: "You are a helpful assistant.".to_string(),
        history_limit,
        use_system_role,
        ..TurnConfig::default()
    }
}

/// system, then alternating user/assistant, ending on a user message.
fn history(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("stored prompt")];
    for i in 0..turns {
        messages.push(Message::user(format!("question {}", i)));
        messages.push(Message::assistant(format!("answer {}", i)));
    }
    messages.push(Message::user("latest"));
    messages
}

// ========================================================================
// Settings Tests (config/mod.rs)
// ========================================================================

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.server.base_url, "http://localhost:1234/v1");
    assert_eq!(settings.server.model, "local-model");
    assert_eq!(settings.generation.temperature, 0.7);
    assert_eq!(settings.generation.max_tokens, 2000);
    assert_eq!(settings.prompt.system_prompt, "You are a helpful assistant.");
    assert_eq!(settings.prompt.history_limit, 10);
    assert!(settings.prompt.use_system_role);
    assert!(!settings.tools.enabled);
}

#[test]
fn test_settings_save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut settings = Settings::default();
    settings.server.model = "llama-3.2-3b".to_string();
    settings.prompt.use_system_role = false;
    settings.tools.enabled = true;
    settings.save_to(&config_path).unwrap();

    let loaded = Settings::load_from(&config_path);
    assert_eq!(loaded.server.model, "llama-3.2-3b");
    assert!(!loaded.prompt.use_system_role);
    assert!(loaded.tools.enabled);
}

#[test]
fn test_settings_load_invalid_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "this is = = not toml").unwrap();

    let loaded = Settings::load_from(&config_path);
    assert_eq!(loaded.server.model, "local-model");
}

#[test]
fn test_settings_history_dir_override() {
    let mut settings = Settings::default();
    settings.storage.history_dir = Some("/tmp/lmchat-history".into());
    assert_eq!(settings.history_dir(), std::path::PathBuf::from("/tmp/lmchat-history"));
}

// ========================================================================
// PayloadBuilder Tests (context/builder.rs)
// ========================================================================

#[test]
fn test_system_role_mode_leads_with_system_text() {
    let context = ContextStore::new();
    for limit in [2, 3, 10, 50] {
        let config = config(true, limit);
        let history = history(4);
        let builder = PayloadBuilder::new(&config, &context);

        let payload = builder.build(&history);
        let windowed = builder.windowed_history(&history);

        assert_eq!(payload[0].role, Role::System);
        assert_eq!(payload[0].text(), Some(builder.system_text().as_str()));
        assert_eq!(payload.len(), windowed.len() + 1);
    }
}

#[test]
fn test_window_keeps_last_messages_in_order() {
    let config = config(true, 3);
    let context = ContextStore::new();
    let history = history(5); // 11 non-system messages

    let payload = PayloadBuilder::new(&config, &context).build(&history);

    assert_eq!(payload.len(), 4);
    assert_eq!(
        &payload[1..],
        &[
            Message::user("question 4"),
            Message::assistant("answer 4"),
            Message::user("latest"),
        ]
    );
}

#[test]
fn test_compat_mode_has_no_system_role_and_prefixes_text() {
    let mut context = ContextStore::new();
    context.add_file("readme.md", "# Title");
    for limit in [2, 3, 4, 10] {
        let config = config(false, limit);
        let history = history(3);
        let builder = PayloadBuilder::new(&config, &context);

        let payload = builder.build(&history);

        assert!(payload.iter().all(|m| m.role != Role::System));
        assert!(payload[0].content.leading_text().starts_with(&builder.system_text()));
    }
}

#[test]
fn test_compat_mode_merges_into_first_user_message() {
    let config = config(false, 10);
    let context = ContextStore::new();
    let history = vec![Message::user("hello")];

    let payload = PayloadBuilder::new(&config, &context).build(&history);

    assert_eq!(
        payload,
        vec![Message::user("You are a helpful assistant.\n\nhello")]
    );
}

#[test]
fn test_images_become_blocks_in_attachment_order() {
    let config = config(true, 10);
    let mut context = ContextStore::new();
    let names = ["one.png", "two.jpg", "three.webp"];
    for name in names {
        context.add_image(name, ImageAttachment::new("image/png", name.to_uppercase()));
    }
    let history = history(1);

    let payload = PayloadBuilder::new(&config, &context).build(&history);

    let Content::Blocks(blocks) = &payload.last().unwrap().content else {
        panic!("expected multimodal content");
    };
    assert_eq!(blocks.len(), names.len() + 1);
    assert_eq!(blocks[0], ContentBlock::text("latest"));
    for (block, name) in blocks[1..].iter().zip(names) {
        assert_eq!(
            block,
            &ContentBlock::image(format!("data:image/png;base64,{}", name.to_uppercase()))
        );
    }

    // The stored history is untouched.
    assert_eq!(history.last().unwrap(), &Message::user("latest"));
}

#[test]
fn test_build_is_deterministic() {
    let config = config(false, 4);
    let mut context = ContextStore::new();
    context.add_file("a.txt", "alpha");
    context.add_image("b.png", ImageAttachment::new("image/png", "B"));
    let history = history(3);
    let builder = PayloadBuilder::new(&config, &context);

    assert_eq!(builder.build(&history), builder.build(&history));
}

#[test]
fn test_request_serializes_to_openai_body() {
    let config = config(true, 10);
    let context = ContextStore::new();
    let request = PayloadBuilder::new(&config, &context).build_request(&[Message::user("hi")]);

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "local-model");
    assert_eq!(json["stream"], true);
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["content"], "hi");
}

// ========================================================================
// ContextStore Tests (context/store.rs)
// ========================================================================

#[test]
fn test_attach_path_routes_by_extension() {
    let temp_dir = TempDir::new().unwrap();
    let text = temp_dir.path().join("notes.md");
    let image = temp_dir.path().join("diagram.PNG");
    std::fs::write(&text, "some notes").unwrap();
    std::fs::write(&image, [137u8, 80, 78, 71]).unwrap();

    let mut context = ContextStore::new();
    let extractor = FsExtractor;
    assert_eq!(context.attach_path(&extractor, &text).unwrap(), Attached::File);
    assert_eq!(context.attach_path(&extractor, &image).unwrap(), Attached::Image);
    assert_eq!(context.attach_path(&extractor, &text).unwrap(), Attached::Duplicate);

    let (_, img) = context.images().next().unwrap();
    assert_eq!(img.media_type, "image/png");
    assert_eq!(img.data_uri(), "data:image/png;base64,iVBORw==");
    assert_eq!(context.files().next(), Some(("notes.md", "some notes")));
}

// ========================================================================
// History store Tests (context/persistence.rs)
// ========================================================================

#[test]
fn test_file_store_second_save_wins() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileHistoryStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

    store.save("chat-1", &[Message::user("v1")], "New Chat").unwrap();
    store
        .save("chat-1", &[Message::user("v2"), Message::assistant("r2")], "v2")
        .unwrap();

    let loaded = store.load("chat-1").unwrap();
    assert_eq!(loaded.messages, vec![Message::user("v2"), Message::assistant("r2")]);
    assert_eq!(loaded.metadata.title, "v2");
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn test_memory_store_second_save_wins() {
    let store = MemoryHistoryStore::new();

    store.save("chat-1", &[Message::user("v1")], "a").unwrap();
    store.save("chat-1", &[Message::user("v2")], "b").unwrap();

    let loaded = store.load("chat-1").unwrap();
    assert_eq!(loaded.messages, vec![Message::user("v2")]);
    assert_eq!(loaded.metadata.title, "b");
}

#[test]
fn test_file_store_lists_most_recent_first_and_deletes() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileHistoryStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

    store.save("older", &[], "Older").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.save("newer", &[], "Newer").unwrap();

    let titles: Vec<_> = store.list_all().unwrap().into_iter().map(|m| m.title).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);

    store.delete("newer").unwrap();
    assert!(matches!(store.load("newer"), Err(ChatError::NotFound(_))));
    assert_eq!(store.list_all().unwrap().len(), 1);

    // Deleting again is fine.
    store.delete("newer").unwrap();
}

#[test]
fn test_file_store_reads_multimodal_content() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileHistoryStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
    let message = Message::user(Content::Blocks(vec![
        ContentBlock::text("look"),
        ContentBlock::image("data:image/jpeg;base64,AAAA"),
    ]));

    store.save("mm", std::slice::from_ref(&message), "look").unwrap();
    assert_eq!(store.load("mm").unwrap().messages, vec![message]);
}
