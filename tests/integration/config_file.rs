//! Config files on disk: round trips, partial files and rejection.

use circadian::{CircadianConfig, CircadianError, PhaseFeatures};

#[test]
fn test_saved_config_loads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = CircadianConfig {
        heartbeat_secs: 15,
        whisper_batch_size: 2,
        features: PhaseFeatures {
            brightness: false,
            ..PhaseFeatures::default()
        },
        ..CircadianConfig::default()
    };
    config.save_to_file(&path).unwrap();

    assert_eq!(CircadianConfig::from_file(&path).unwrap(), config);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "speak_min_idle_secs = 5\n\n[features]\nsleep_dnd = false\n").unwrap();

    let config = CircadianConfig::from_file(&path).unwrap();
    assert_eq!(config.speak_min_idle_secs, 5);
    assert!(!config.features.sleep_dnd);
    assert!(config.features.focus_dnd);
    assert_eq!(config.heartbeat_secs, CircadianConfig::default().heartbeat_secs);
}

#[test]
fn test_invalid_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let zero = dir.path().join("zero.toml");
    std::fs::write(&zero, "heartbeat_secs = 0\n").unwrap();
    assert!(matches!(
        CircadianConfig::from_file(&zero),
        Err(CircadianError::Config(msg)) if msg.contains("heartbeat_secs")
    ));

    let garbled = dir.path().join("garbled.toml");
    std::fs::write(&garbled, "heartbeat_secs = \"soon\"\n").unwrap();
    assert!(matches!(
        CircadianConfig::from_file(&garbled),
        Err(CircadianError::Config(_))
    ));

    assert!(matches!(
        CircadianConfig::from_file(&dir.path().join("missing.toml")),
        Err(CircadianError::Io(_))
    ));
}
