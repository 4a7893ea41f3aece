use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use wg_manager::config::{Settings, SettingsError, SettingsManager};
use wg_manager::logging::options_from_settings;

#[test]
fn test_load_full_settings() {
    let mut file = NamedTempFile::new().unwrap();

    let settings_str = r#"
        log_level = "debug"

        [manager]
        activation_timeout_secs = 20
        deactivation_timeout_secs = 5
        runtime_refresh_interval_ms = 500

        [storage]
        tunnels_dir = "/etc/wireguard"

        [logging]
        json = true
        log_to_file = true
        log_dir = "/var/log/wg-manager"
    "#;

    file.write_all(settings_str.as_bytes()).unwrap();

    let settings = Settings::load(file.path()).unwrap();

    assert_eq!(settings.log_level, "debug");
    assert_eq!(settings.manager.activation_timeout_secs, 20);
    assert_eq!(settings.manager.deactivation_timeout_secs, 5);
    assert_eq!(
        settings.manager.runtime_refresh_interval(),
        Duration::from_millis(500)
    );
    assert_eq!(settings.storage.tunnels_dir(), PathBuf::from("/etc/wireguard"));
    assert!(settings.logging.json);

    let options = settings.manager_options();
    assert_eq!(options.activation_timeout, Duration::from_secs(20));
    assert_eq!(options.deactivation_timeout, Duration::from_secs(5));

    let log = options_from_settings(&settings);
    assert!(log.json_format);
    assert_eq!(log.log_dir, PathBuf::from("/var/log/wg-manager"));
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = NamedTempFile::new().unwrap();
    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_invalid_settings() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[manager]\ndeactivation_timeout_secs = 0\n")
        .unwrap();
    assert!(matches!(
        Settings::load(file.path()),
        Err(SettingsError::InvalidValue { ref key, .. }) if key == "manager.deactivation_timeout_secs"
    ));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"log_level = [1, 2]\n").unwrap();
    assert!(matches!(
        Settings::load(file.path()),
        Err(SettingsError::TomlError(_))
    ));
}

#[test]
fn test_settings_manager_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    let settings = Settings {
        log_level: "warn".to_string(),
        ..Default::default()
    };
    settings.save(&path).unwrap();

    let mut manager = SettingsManager::load(&path).unwrap();
    assert_eq!(manager.settings().log_level, "warn");

    manager.settings_mut().storage.tunnels_dir = Some(dir.path().join("tunnels"));
    let copy = dir.path().join("copy.toml");
    manager.save_as(&copy).unwrap();

    let reloaded = SettingsManager::load(&copy).unwrap();
    assert_eq!(
        reloaded.settings().storage.tunnels_dir(),
        dir.path().join("tunnels")
    );
}
