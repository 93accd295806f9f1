use appforge::backends::BackendKind;
use appforge::config::Config;
use tempfile::TempDir;

#[test]
fn config_round_trips_through_toml_file() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("config.toml");

    let mut config = Config::default();
    config.default_backend = "gemini".to_string();
    config.backend_config_mut(BackendKind::Gemini).api_key = "test-key".to_string();
    config.backend_config_mut(BackendKind::Gemini).models =
        vec!["gemini-2.5-pro".to_string(), "gemini-2.5-flash".to_string()];
    config.publish.token = "ghp_test".to_string();
    config.publish.branch = "published".to_string();
    config.publish.private = true;

    config.save_to(&path).expect("Failed to save config");
    let loaded = Config::load_from(&path).expect("Failed to load config");

    assert_eq!(loaded.default_backend, "gemini");
    assert_eq!(
        loaded
            .backends
            .get("gemini")
            .map(|b| b.api_key.as_str()),
        Some("test-key")
    );
    assert_eq!(loaded.publish.branch, "published");
    assert!(loaded.publish.private);

    let descriptors = loaded.backend_descriptors();
    let gemini = descriptors
        .iter()
        .find(|d| d.kind == BackendKind::Gemini)
        .expect("gemini descriptor");
    assert!(gemini.has_credential());
    assert_eq!(gemini.models.len(), 2);
}

#[test]
fn save_creates_missing_parent_directories() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("nested").join("dir").join("config.toml");

    Config::default().save_to(&path).expect("Failed to save config");
    assert!(path.exists());
}

#[test]
fn broken_toml_is_a_readable_error() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "default_backend = [not toml").expect("Failed to write file");

    let err = Config::load_from(&path).expect_err("invalid file should fail");
    assert!(err.to_string().contains("Invalid configuration file"));
}
