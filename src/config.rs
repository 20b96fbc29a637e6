//! Configuration for openmhz-player.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags
//! 2. Environment variables (OPENMHZ_PROXY_URL, OPENMHZ_API_BASE,
//!    OPENMHZ_DOWNLOAD_DIR, OPENMHZ_SYSTEM)
//! 3. Config file (.openmhz/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .openmhz/config.yaml
//! - `download_dir` in the config file is relative to the directory holding .openmhz/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::openmhz::DEFAULT_API_BASE;

pub const DEFAULT_PROXY_URL: &str = "http://localhost:8191/v1";
pub const DEFAULT_PROXY_MAX_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 2;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    pub url: Option<String>,
    pub max_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    pub fetch_interval_seconds: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub grace_period_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaConfig {
    pub download_dir: Option<String>,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub mpg123: Option<String>,
}

/// Binaries used for playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSettings {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub mpg123: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            mpg123: "mpg123".to_string(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub system: Option<String>,
    pub proxy_url: Option<String>,
    pub fetch_interval_secs: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub grace_period_secs: Option<u64>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// FlareSolverr v1 endpoint
    pub proxy_url: String,
    /// Solve budget handed to FlareSolverr
    pub proxy_max_timeout_ms: u64,
    /// OpenMHz API base URL
    pub api_base: String,
    /// Pre-selected system short name (skips the prompt)
    pub system: Option<String>,
    pub fetch_interval: Duration,
    pub queue_capacity: usize,
    pub grace_period: Duration,
    /// Scratch space for per-call downloads; leftover call directories are cleared at startup
    pub download_dir: PathBuf,
    pub media: MediaSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("queue capacity must be at least 1");
        }
        if self.fetch_interval.is_zero() {
            anyhow::bail!("fetch interval must be greater than zero");
        }
        if self.proxy_url.trim().is_empty() {
            anyhow::bail!("proxy URL must not be empty");
        }
        Ok(())
    }
}

/// Default download directory (<cache dir>/openmhz-player/downloads)
pub fn default_download_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("openmhz-player")
        .join("downloads")
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".openmhz").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load configuration from all sources
pub fn load(overrides: &Overrides) -> Result<Settings> {
    let config_file = find_config_file();
    resolve(config_file, |key| std::env::var(key).ok(), overrides)
}

/// Merge config file, environment and overrides
fn resolve(
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<Settings> {
    let (file, base_dir) = match config_file {
        Some(ref path) => {
            let file = load_config_file(path)?;
            // Parent of .openmhz/ is the project root
            let base_dir = path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (file, Some(base_dir))
        }
        None => (ConfigFile::default(), None),
    };

    let proxy_url = overrides
        .proxy_url
        .clone()
        .or_else(|| env("OPENMHZ_PROXY_URL"))
        .or(file.proxy.url)
        .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string());

    let api_base = env("OPENMHZ_API_BASE")
        .or(file.api.base_url)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let system = overrides
        .system
        .clone()
        .or_else(|| env("OPENMHZ_SYSTEM"))
        .or(file.system)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let download_dir = match env("OPENMHZ_DOWNLOAD_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => match (file.media.download_dir.as_deref(), base_dir.as_deref()) {
            (Some(dir), Some(base)) => resolve_path(base, dir),
            (Some(dir), None) => PathBuf::from(dir),
            (None, _) => default_download_dir(),
        },
    };

    let defaults = MediaSettings::default();
    let media = MediaSettings {
        ffmpeg: file.media.ffmpeg.unwrap_or(defaults.ffmpeg),
        ffprobe: file.media.ffprobe.unwrap_or(defaults.ffprobe),
        mpg123: file.media.mpg123.unwrap_or(defaults.mpg123),
    };

    let settings = Settings {
        proxy_url,
        proxy_max_timeout_ms: file
            .proxy
            .max_timeout_ms
            .unwrap_or(DEFAULT_PROXY_MAX_TIMEOUT_MS),
        api_base,
        system,
        fetch_interval: Duration::from_secs(
            overrides
                .fetch_interval_secs
                .or(file.pipeline.fetch_interval_seconds)
                .unwrap_or(DEFAULT_FETCH_INTERVAL_SECS),
        ),
        queue_capacity: overrides
            .queue_capacity
            .or(file.pipeline.queue_capacity)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY),
        grace_period: Duration::from_secs(
            overrides
                .grace_period_secs
                .or(file.pipeline.grace_period_seconds)
                .unwrap_or(DEFAULT_GRACE_PERIOD_SECS),
        ),
        download_dir,
        media,
        config_file,
    };

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = resolve(None, no_env, &Overrides::default()).unwrap();

        assert_eq!(settings.proxy_url, DEFAULT_PROXY_URL);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.fetch_interval, Duration::from_secs(5));
        assert_eq!(settings.queue_capacity, 50);
        assert_eq!(settings.grace_period, Duration::from_secs(2));
        assert_eq!(settings.download_dir, default_download_dir());
        assert_eq!(settings.media, MediaSettings::default());
        assert!(settings.system.is_none());
        assert!(settings.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".openmhz");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1"
system: metrofire
proxy:
  url: http://solver:8191/v1
  max_timeout_ms: 30000
pipeline:
  fetch_interval_seconds: 10
  queue_capacity: 5
media:
  download_dir: scratch
  mpg123: /usr/local/bin/mpg123
"#
        )
        .unwrap();

        let settings = resolve(Some(config_path.clone()), no_env, &Overrides::default()).unwrap();

        assert_eq!(settings.proxy_url, "http://solver:8191/v1");
        assert_eq!(settings.proxy_max_timeout_ms, 30_000);
        assert_eq!(settings.system.as_deref(), Some("metrofire"));
        assert_eq!(settings.fetch_interval, Duration::from_secs(10));
        assert_eq!(settings.queue_capacity, 5);
        assert_eq!(settings.grace_period, Duration::from_secs(2));
        assert_eq!(settings.download_dir, temp.path().join("scratch"));
        assert_eq!(settings.media.mpg123, "/usr/local/bin/mpg123");
        assert_eq!(settings.media.ffmpeg, "ffmpeg");
        assert_eq!(settings.config_file, Some(config_path));
    }

    #[test]
    fn test_precedence_flags_over_env_over_file() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".openmhz");
        std::fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("config.yaml");
        std::fs::write(
            &config_path,
            "system: from-file\nproxy:\n  url: http://file:8191/v1\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("OPENMHZ_PROXY_URL", "http://env:8191/v1"),
            ("OPENMHZ_SYSTEM", "from-env"),
            ("OPENMHZ_DOWNLOAD_DIR", "/tmp/openmhz-env"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let settings = resolve(Some(config_path.clone()), lookup, &Overrides::default()).unwrap();
        assert_eq!(settings.proxy_url, "http://env:8191/v1");
        assert_eq!(settings.system.as_deref(), Some("from-env"));
        assert_eq!(settings.download_dir, PathBuf::from("/tmp/openmhz-env"));

        let overrides = Overrides {
            system: Some("from-flag".to_string()),
            proxy_url: Some("http://flag:8191/v1".to_string()),
            ..Default::default()
        };
        let settings = resolve(Some(config_path), lookup, &overrides).unwrap();
        assert_eq!(settings.proxy_url, "http://flag:8191/v1");
        assert_eq!(settings.system.as_deref(), Some("from-flag"));
    }

    #[test]
    fn test_blank_system_is_none() {
        let overrides = Overrides {
            system: Some("   ".to_string()),
            ..Default::default()
        };
        let settings = resolve(None, no_env, &overrides).unwrap();
        assert!(settings.system.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_capacity = Overrides {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(resolve(None, no_env, &zero_capacity).is_err());

        let zero_interval = Overrides {
            fetch_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(resolve(None, no_env, &zero_interval).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./downloads"),
            PathBuf::from("/home/user/project/./downloads")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
