//! Environment overrides live in their own test binary so the variables set
//! here cannot leak into other settings tests.

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use wg_manager::config::Settings;

#[test]
fn test_env_overrides_take_precedence() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"log_level = \"info\"\n[manager]\nactivation_timeout_secs = 20\n")
        .unwrap();

    // SAFETY: this is the only test in this binary
    unsafe {
        std::env::set_var("WG_MANAGER_LOG_LEVEL", "trace");
        std::env::set_var("WG_MANAGER_ACTIVATION_TIMEOUT_SECS", "7");
        std::env::set_var("WG_MANAGER_DEACTIVATION_TIMEOUT_SECS", "not-a-number");
        std::env::set_var("WG_MANAGER_TUNNELS_DIR", "/srv/tunnels");
        std::env::set_var("WG_MANAGER_LOG_JSON", "yes");
    }

    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.log_level, "trace");
    assert_eq!(settings.manager.activation_timeout_secs, 7);
    // Unparseable values are ignored
    assert_eq!(settings.manager.deactivation_timeout_secs, 15);
    assert_eq!(settings.storage.tunnels_dir(), PathBuf::from("/srv/tunnels"));
    assert!(settings.logging.json);

    let from_env = Settings::from_env().unwrap();
    assert_eq!(from_env.manager.activation_timeout_secs, 7);

    unsafe {
        std::env::set_var("WG_MANAGER_LOG_LEVEL", "shouting");
    }
    assert!(Settings::load(file.path()).is_err());
}
