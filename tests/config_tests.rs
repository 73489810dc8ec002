use std::time::Duration;

use style_studio::config::{Configuration, from_yaml_file};

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
working-max-dim: 800
style-size: 128
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.working_max_dim, 800);
    assert_eq!(cfg.style_size, 128);
    assert_eq!(cfg.debounce, Duration::from_millis(100));
    assert_eq!(cfg.max_in_flight, 2);
}

#[test]
fn empty_config_yields_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.working_max_dim, 1024);
    assert_eq!(cfg.style_size, 256);
    assert_eq!(cfg.debounce, Duration::from_millis(100));
    assert_eq!(cfg.max_in_flight, 2);
    cfg.validate().unwrap();
}

#[test]
fn parse_humantime_debounce() {
    let yaml = r#"
debounce: 250ms
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.debounce, Duration::from_millis(250));
}

#[test]
fn validate_rejects_zero_dimensions() {
    let cfg: Configuration = serde_yaml::from_str("working-max-dim: 0").unwrap();
    assert!(cfg.validate().is_err());

    let cfg: Configuration = serde_yaml::from_str("style-size: 0").unwrap();
    assert!(cfg.validate().is_err());

    let cfg: Configuration = serde_yaml::from_str("max-in-flight: 0").unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "debounce: 1s\nstyle-size: 64\n").unwrap();

    let cfg = from_yaml_file(&path).unwrap();
    assert_eq!(cfg.debounce, Duration::from_secs(1));
    assert_eq!(cfg.style_size, 64);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = from_yaml_file(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, style_studio::error::Error::Io(_)));
}
