use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://nl1.api.radio-browser.info/json",
    "https://at1.api.radio-browser.info/json",
    "https://de1.api.radio-browser.info/json",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub cors_origins: Vec<String>,
    #[serde(flatten)]
    pub upstream: UpstreamConfig,
}

/// Everything the upstream client needs; immutable once the server starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub mirrors: Vec<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8001)),
            cors_origins: vec!["*".to_string()],
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            user_agent: "RadioDirectoryApp/1.0".to_string(),
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn mirror_urls(&self) -> Result<Vec<Url>> {
        self.mirrors
            .iter()
            .map(|m| {
                let url = Url::parse(m.trim()).with_context(|| format!("Invalid mirror URL: {m}"))?;
                if url.cannot_be_a_base() {
                    bail!("Mirror URL cannot carry a path: {m}");
                }
                Ok(url)
            })
            .collect()
    }
}

impl AppConfig {
    /// Reads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read config: {path:?}")),
        };
        let text = String::from_utf8_lossy(&bytes);
        toml::from_str(&text).with_context(|| format!("Invalid config TOML: {path:?}"))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(servers) = lookup("RADIO_BROWSER_SERVERS") {
            self.upstream.mirrors = split_list(&servers);
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.cors_origins = split_list(&origins);
        }
        if let Some(listen) = lookup("RADIO_DIRECTORY_LISTEN") {
            self.listen = listen
                .trim()
                .parse()
                .with_context(|| format!("Invalid RADIO_DIRECTORY_LISTEN: {listen}"))?;
        }
        if let Some(agent) = lookup("RADIO_DIRECTORY_USER_AGENT") {
            self.upstream.user_agent = agent;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.mirrors.is_empty() {
            bail!("At least one upstream mirror must be configured");
        }
        if self.upstream.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        self.upstream.mirror_urls()?;
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("RADIO_DIRECTORY_CONFIG") {
        return Some(PathBuf::from(explicit));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("radio-directory").join("config.toml"))
}
