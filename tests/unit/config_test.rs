//! Unit tests for configuration module

use image_studio::config::Settings;
use std::io::Write;
use tempfile::NamedTempFile;

fn yaml_file() -> NamedTempFile {
    tempfile::Builder::new().suffix(".yaml").tempfile().unwrap()
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();

    assert_eq!(settings.server.host, "localhost");
    assert_eq!(settings.server.port, 3000);
    assert_eq!(settings.admin.session_ttl_secs, 86400);
    assert_eq!(settings.stats.file_path, "stats.json");
    assert_eq!(settings.generation.max_per_request, 4);
    assert_eq!(settings.generation.batch_delay_ms, 5000);
    assert_eq!(settings.enhancement.api_key_env, "GEMINI_API_KEY");
    assert!((settings.enhancement.temperature - 0.8).abs() < f32::EPSILON);
}

#[test]
fn test_settings_validation_valid() {
    assert!(Settings::default().validate().is_ok());
}

#[test]
fn test_settings_validation_invalid_port() {
    let mut settings = Settings::default();
    settings.server.port = 0;

    assert!(settings.validate().is_err());
}

#[test]
fn test_settings_validation_empty_base_url() {
    let mut settings = Settings::default();
    settings.generation.base_url = "  ".to_string();

    assert!(settings.validate().is_err());
}

#[test]
fn test_settings_validation_zero_batch_size() {
    let mut settings = Settings::default();
    settings.generation.max_per_request = 0;

    assert!(settings.validate().is_err());
}

#[test]
fn test_settings_validation_temperature_range() {
    let mut settings = Settings::default();
    settings.enhancement.temperature = 2.5;

    assert!(settings.validate().is_err());
}

#[test]
fn test_load_from_yaml_file() {
    let mut file = yaml_file();
    writeln!(
        file,
        "server:\n  port: 8080\ngeneration:\n  base_url: http://localhost:9000/v1\n  batch_delay_ms: 10\nstats:\n  file_path: /tmp/counters.json"
    )
    .unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();

    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.generation.base_url, "http://localhost:9000/v1");
    assert_eq!(settings.generation.batch_delay_ms, 10);
    assert_eq!(settings.generation.max_per_request, 4);
    assert_eq!(settings.stats.file_path, "/tmp/counters.json");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let settings = Settings::load_from_path("does/not/exist.yaml").unwrap();

    assert_eq!(settings.generation.text_model, "nano-banana");
    assert_eq!(settings.generation.edit_model, "nano-banana-r2i");
}

#[test]
fn test_load_rejects_invalid_values() {
    let mut file = yaml_file();
    writeln!(file, "generation:\n  max_per_request: 0").unwrap();

    assert!(Settings::load_from_path(file.path()).is_err());
}
