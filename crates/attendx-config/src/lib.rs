use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/attendx/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/attendx/config.toml";

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 72.0;
pub const DEFAULT_VERIFY_DEADLINE_SECS: f64 = 2.0;
pub const DEFAULT_RATE_LIMIT_ATTEMPTS: usize = 3;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_STORE_PATH: &str = "/var/lib/attendx/store.json";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub match_threshold: Option<f64>,
    pub min_confidence: Option<f64>,
    pub verify_deadline_secs: Option<f64>,
    pub rate_limit_attempts: Option<usize>,
    pub rate_limit_window_secs: Option<u64>,
    pub lecture_start_hour: Option<u32>,
    pub lecture_end_hour: Option<u32>,
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub match_threshold: f64,
    pub min_confidence: f64,
    pub verify_deadline: Duration,
    pub rate_limit_attempts: usize,
    pub rate_limit_window: Duration,
    pub lecture_start_hour: Option<u32>,
    pub lecture_end_hour: Option<u32>,
    pub store_path: PathBuf,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            match_threshold: raw.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD),
            min_confidence: raw.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            verify_deadline: Duration::from_secs_f64(
                raw.verify_deadline_secs
                    .unwrap_or(DEFAULT_VERIFY_DEADLINE_SECS)
                    .max(0.1),
            ),
            rate_limit_attempts: raw
                .rate_limit_attempts
                .unwrap_or(DEFAULT_RATE_LIMIT_ATTEMPTS)
                .max(1),
            rate_limit_window: Duration::from_secs(
                raw.rate_limit_window_secs
                    .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS)
                    .max(1),
            ),
            lecture_start_hour: raw.lecture_start_hour,
            lecture_end_hour: raw.lecture_end_hour,
            store_path: raw
                .store_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    let sources = [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ];
    load_resolved_from_paths(&sources)
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<(ConfigFile, PathBuf)>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some((parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some((contents, path)) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(contents),
            source: Some(path),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}

pub fn load_resolved_from_file(path: &Path) -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&[path.to_path_buf()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn primary_path_wins() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("primary.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "rate_limit_attempts = 5").unwrap();
        fs::write(&primary, "rate_limit_attempts = 2").unwrap();

        let loaded = load_resolved_from_paths(&[primary.clone(), secondary.clone()]).unwrap();
        assert_eq!(loaded.source, Some(primary));
        assert_eq!(loaded.resolved.rate_limit_attempts, 2);
    }

    #[test]
    fn secondary_used_when_primary_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let secondary = dir.path().join("secondary.toml");
        fs::write(&secondary, "match_threshold = 0.4").unwrap();

        let loaded = load_resolved_from_paths(&[missing, secondary.clone()]).unwrap();
        assert_eq!(loaded.source, Some(secondary));
        assert_eq!(loaded.resolved.match_threshold, 0.4);
    }

    #[test]
    fn parse_errors_are_reported() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "match_threshold = { nope = true }").unwrap();

        let err = load_from_paths(&[broken.clone()]).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, broken),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn defaults_apply_when_no_file_found() {
        let loaded = load_resolved_from_paths(&[]).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.resolved.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(loaded.resolved.min_confidence, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(loaded.resolved.verify_deadline, Duration::from_secs(2));
        assert_eq!(
            loaded.resolved.rate_limit_attempts,
            DEFAULT_RATE_LIMIT_ATTEMPTS
        );
        assert!(loaded.resolved.lecture_start_hour.is_none());
    }

    #[test]
    fn lecture_window_hours_parse_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "lecture_start_hour = 9\nlecture_end_hour = 17").unwrap();

        let loaded = load_resolved_from_file(&path).unwrap();
        assert_eq!(loaded.resolved.lecture_start_hour, Some(9));
        assert_eq!(loaded.resolved.lecture_end_hour, Some(17));
    }

    #[test]
    fn fractional_deadline_is_supported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "verify_deadline_secs = 0.5").unwrap();

        let loaded = load_resolved_from_file(&path).unwrap();
        assert_eq!(loaded.resolved.verify_deadline, Duration::from_millis(500));
    }

    #[test]
    fn zero_attempts_clamp_to_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "rate_limit_attempts = 0").unwrap();

        let loaded = load_resolved_from_file(&path).unwrap();
        assert_eq!(loaded.resolved.rate_limit_attempts, 1);
    }
}
