use std::fs;

use taskboard::config::{Config, SeedKind, CONFIG_FILE};
use taskboard::prefs::ViewMode;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_dir(dir.path());

    assert_eq!(config.history.limit, 500);
    assert!(!config.history.record_initial_load);
    assert_eq!(config.seed.source, SeedKind::Url);
    assert_eq!(config.preferences.view, ViewMode::Board);
    assert_eq!(config.preferences.page_size, 10);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[history]
limit = 20

[seed]
source = "url"
url = "http://localhost:9/tasks.json"

[preferences]
view = "table"
"#;
    fs::write(dir.path().join(CONFIG_FILE), toml)?;

    let config = Config::load_from_dir(dir.path());
    assert_eq!(config.history.limit, 20);
    assert_eq!(config.seed.url, "http://localhost:9/tasks.json");
    assert_eq!(config.preferences.view, ViewMode::Table);
    assert_eq!(config.preferences.page_size, 10);
    Ok(())
}

#[test]
fn invalid_config_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join(CONFIG_FILE), "[preferences]\npage_size = 0")?;

    assert!(Config::load(&dir.path().join(CONFIG_FILE)).is_err());
    let config = Config::load_from_dir(dir.path());
    assert_eq!(config.preferences.page_size, 10);
    Ok(())
}
