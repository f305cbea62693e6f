//! Tests for layered configuration loading.

use super::*;
use crate::StorageStrategy;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

#[test]
fn parse_minimal_config() {
    let config = ChatlogConfig::load_from_str("{}").expect("config");
    assert_eq!(config, ChatlogConfig::default());
    assert_eq!(config.avatar.base_url, "http://localhost:8000");
}

#[test]
fn parse_full_config() {
    let json5 = r#"{
        // comments are allowed
        storage: {
            strategy: "indexed",
            path: "/tmp/chatlog",
            key: "chat",
            sort_on_load: true,
            event_buffer: 8,
        },
        settings: { path: null },
        avatar: { base_url: "https://avatars.example.com" },
    }"#;
    let config = ChatlogConfig::load_from_str(json5).expect("config");
    assert_eq!(config.storage.strategy, StorageStrategy::Indexed);
    assert_eq!(config.storage.path.as_deref(), Some("/tmp/chatlog"));
    assert_eq!(config.storage.key, "chat");
    assert!(config.storage.sort_on_load);
    assert_eq!(config.storage.event_buffer, 8);
    assert_eq!(config.settings.path, None);
    assert_eq!(config.avatar.base_url, "https://avatars.example.com");
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = ChatlogConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_unknown_strategy() {
    let err = ChatlogConfig::load_from_str(r#"{ storage: { strategy: "cloud" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("storage.strategy"));
    assert!(msg.contains("object_store"));
}

#[test]
fn rejects_key_with_separator() {
    let err = ChatlogConfig::load_from_str(r#"{ storage: { key: "a/b" } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_blob_key_shared_with_settings_document() {
    let err = ChatlogConfig::load_from_str(
        r#"{ storage: { strategy: "blob", path: "/tmp/chatlog", key: "settings" } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(format!("{err}").contains("settings.path"));

    let err = ChatlogConfig::load_from_str(
        r#"{
            storage: { strategy: "blob", path: "/tmp/chatlog", key: "settings" },
            settings: { path: "/tmp/chatlog" },
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn settings_key_is_allowed_when_stores_do_not_share_a_file() {
    let separate = ChatlogConfig::load_from_str(
        r#"{
            storage: { strategy: "blob", path: "/tmp/chatlog", key: "settings" },
            settings: { path: "/tmp/chatlog-settings" },
        }"#,
    )
    .expect("separate settings dir");
    assert_eq!(separate.storage.key, "settings");

    let indexed = ChatlogConfig::load_from_str(
        r#"{ storage: { strategy: "indexed", path: "/tmp/chatlog", key: "settings" } }"#,
    )
    .expect("indexed keys carry a suffix");
    assert_eq!(indexed.storage.strategy, StorageStrategy::Indexed);
}

#[test]
fn rejects_zero_event_buffer() {
    let err = ChatlogConfig::load_from_str("{ storage: { event_buffer: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("event_buffer"));
}

#[test]
fn rejects_non_http_avatar_url() {
    let err =
        ChatlogConfig::load_from_str(r#"{ avatar: { base_url: "ftp://example" } }"#).unwrap_err();
    assert!(format!("{err}").contains("avatar.base_url"));
}

#[test]
fn cwd_layer_overrides_user_layer() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = root.join("home").join(".chatlog").join(DEFAULT_CONFIG_FILE);
    write_json5(
        &user_config,
        r#"{ storage: { strategy: "blob", key: "user" } }"#,
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), r#"{ storage: { key: "cwd" } }"#);

    let mut options = LayeredConfigOptions::new(&cwd);
    options.user_config_path = Some(user_config.clone());

    let layered = ChatlogConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.storage.strategy, StorageStrategy::Blob);
    assert_eq!(layered.config.storage.key, "cwd");
    let sources: Vec<ConfigLayerSource> = layered.layers.iter().map(|l| l.source).collect();
    assert_eq!(sources, vec![ConfigLayerSource::User, ConfigLayerSource::Cwd]);
    assert_eq!(layered.layers[0].path, user_config);
}

#[test]
fn runtime_override_wins() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    write_json5(
        &root.join(DEFAULT_CONFIG_FILE),
        r#"{ storage: { strategy: "blob" } }"#,
    );
    let runtime_config = root.join("runtime.json5");
    write_json5(&runtime_config, r#"{ storage: { strategy: "memory" } }"#);

    let mut options = LayeredConfigOptions::new(root).with_runtime_path(&runtime_config);
    options.user_config_path = None;

    let layered = ChatlogConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.storage.strategy, StorageStrategy::Memory);
    assert_eq!(layered.layers.len(), 2);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let mut options =
        LayeredConfigOptions::new(temp.path()).with_runtime_path(temp.path().join("nope.json5"));
    options.user_config_path = None;

    let err = ChatlogConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn invalid_layer_names_its_source() {
    let temp = TempDir::new().expect("tmp");
    write_json5(
        &temp.path().join(DEFAULT_CONFIG_FILE),
        "{ storage: { sort_on_load: \"yes\" } }",
    );
    let mut options = LayeredConfigOptions::new(temp.path());
    options.user_config_path = None;

    let err = ChatlogConfig::load_layered_with_options(options).unwrap_err();
    match err {
        ConfigError::InvalidField { path, message } => {
            assert!(path.starts_with("cwd("));
            assert!(path.ends_with(":storage.sort_on_load"));
            assert_eq!(message, "expected bool");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn same_file_as_user_and_cwd_loads_once() {
    let temp = TempDir::new().expect("tmp");
    let config = temp.path().join(DEFAULT_CONFIG_FILE);
    write_json5(&config, "{ storage: { strategy: \"indexed\" } }");
    let mut options = LayeredConfigOptions::new(temp.path());
    options.user_config_path = Some(config);

    let layered = ChatlogConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.layers.len(), 1);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::User);
}
