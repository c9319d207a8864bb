use std::fs;
use std::path::{Path, PathBuf};

use ambience_core::SessionConfig;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Catalog file to use instead of the built-in tracks.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ambience").join("config.toml"))
    }

    /// The user's config file, or defaults if it is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// A config file named on the command line. Unlike [`Config::load`],
    /// problems are reported.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambience_core::AudioSessionPolicy;

    #[test]
    fn test_load_from_full_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
catalog = "/tmp/sounds.toml"
log_level = "debug"

[session.policy]
duck_others = true

[session.volumes]
rain = 80
fire = 20
"#,
        )
        .expect("write config");

        let config = Config::load_from(&path).expect("load config");
        assert_eq!(config.catalog, Some(PathBuf::from("/tmp/sounds.toml")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.session.policy.duck_others);
        assert!(config.session.policy.plays_in_silent_mode);
        assert_eq!(config.session.volumes.get("rain"), Some(&80));
        assert_eq!(config.session.volumes.len(), 2);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "").expect("write config");

        let config = Config::load_from(&path).expect("load config");
        assert!(config.catalog.is_none());
        assert_eq!(config.session.policy, AudioSessionPolicy::default());
    }

    #[test]
    fn test_load_from_reports_problems() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());

        let path = dir.path().join("bad.toml");
        fs::write(&path, "log_level = [").expect("write config");
        assert!(Config::load_from(&path).is_err());
    }
}
