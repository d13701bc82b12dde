//! Configuration file resolution and loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use parcel_track::TrackerConfig;

/// Resolve the config file path.
///
/// Order: explicit flag, `PARCEL_TRACK_CONFIG`, `./.parcel-track/config.json`,
/// then `$HOME/.parcel-track/config.json`.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("PARCEL_TRACK_CONFIG") {
        return PathBuf::from(env_path);
    }

    let cwd_config = PathBuf::from(".parcel-track/config.json");
    if cwd_config.exists() {
        return cwd_config;
    }

    resolve_default_config_path()
}

fn resolve_default_config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".parcel-track").join("config.json")
}

/// Load the tracker config at `path`, overlay credentials from the
/// environment and validate it. A missing file yields the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<TrackerConfig> {
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        TrackerConfig::from_json(&raw).with_context(|| format!("loading {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        TrackerConfig::default()
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some("/tmp/elsewhere.json"));
        assert_eq!(path, PathBuf::from("/tmp/elsewhere.json"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.http_timeout_ms, 30_000);
        assert_eq!(config.yodel.concurrency, 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"truline": {{"concurrency": 4}}, "http_timeout_ms": 2500}}"#
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.truline.concurrency, 4);
        assert_eq!(config.http_timeout_ms, 2500);
        assert_eq!(config.ups.concurrency, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ups": {"cache_size": 0}}"#).unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("cache_size"));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
