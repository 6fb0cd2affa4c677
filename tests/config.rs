use orchestrator_platform::PlatformConfig;
use std::io::Write;
use std::sync::Mutex;

/// `PlatformConfig::load_from_path` reads process environment variables,
/// so tests that touch `ORCHESTRATOR__*` must not run concurrently with
/// each other or they'll observe one another's env mutations.
static ENV_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn defaults_are_sane_without_any_config_file() {
    let config = PlatformConfig::default();
    assert_eq!(config.broker.url, "redis://127.0.0.1:6379");
    assert!(config.broker.in_memory);
    assert_eq!(config.admin.bind_address, "0.0.0.0:8080");
    assert!(config.hooks.enabled);
    assert!(config.agents.is_empty());
}

#[test]
fn loads_agents_from_a_toml_file() {
    let _guard = ENV_GUARD.lock().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[broker]
url = "redis://cache.internal:6379"
in_memory = false

[agents.claude]
model = "claude-3-opus"
capabilities = ["architecture"]
token_limit = 100000
cost_per_token = 0.00001
"#
    )
    .unwrap();

    let config = PlatformConfig::load_from_path(Some(file.path())).unwrap();
    assert_eq!(config.broker.url, "redis://cache.internal:6379");
    assert!(!config.broker.in_memory);
    let claude = config.agents.get("claude").expect("claude agent configured");
    assert_eq!(claude.model, "claude-3-opus");
    assert_eq!(claude.token_limit, 100_000);
}

#[test]
fn env_override_wins_over_file_value() {
    let _guard = ENV_GUARD.lock().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[broker]
url = "redis://file-value:6379"
"#)
    .unwrap();

    std::env::set_var("ORCHESTRATOR__BROKER__URL", "redis://env-value:6379");
    let config = PlatformConfig::load_from_path(Some(file.path())).unwrap();
    std::env::remove_var("ORCHESTRATOR__BROKER__URL");

    assert_eq!(config.broker.url, "redis://env-value:6379");
}

#[test]
fn rejects_an_invalid_broker_url() {
    let _guard = ENV_GUARD.lock().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[broker]
url = "not a url"
"#)
    .unwrap();

    assert!(PlatformConfig::load_from_path(Some(file.path())).is_err());
}
