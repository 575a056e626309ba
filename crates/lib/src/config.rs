//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `./config.json`) and then overridden by
//! environment variables, optionally pre-populated from a dotenv file. It is built once at
//! startup and shared read-only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE Messaging API credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// Restaurant search API settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook (default 8080). Overridden by PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// LINE channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used to verify x-line-signature. Overridden by LINE_BOT_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Channel access token for the reply API. Overridden by LINE_BOT_CHANNEL_TOKEN env.
    pub channel_token: Option<String>,
    /// Messaging API base URL (tests point this at a local stub).
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

/// HotPepper gourmet search config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// API key. Overridden by API_KEY env.
    pub api_key: Option<String>,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Deadline for one search request, in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_search_endpoint() -> String {
    "https://webservice.recruit.co.jp/hotpepper/gourmet/v1/".to_string()
}

fn default_search_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_token: None,
            api_base: default_line_api_base(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Names of required values that are missing (empty when the config is usable).
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if is_blank(&self.line.channel_secret) {
            out.push("LINE_BOT_CHANNEL_SECRET");
        }
        if is_blank(&self.line.channel_token) {
            out.push("LINE_BOT_CHANNEL_TOKEN");
        }
        if is_blank(&self.search.api_key) {
            out.push("API_KEY");
        }
        out
    }

    /// Fails with the list of missing values. Called once at bootstrap.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing();
        if !missing.is_empty() {
            anyhow::bail!("missing required configuration: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Apply environment overrides from a lookup function (std::env::var in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        if let Some(v) = get("LINE_BOT_CHANNEL_SECRET") {
            self.line.channel_secret = Some(v);
        }
        if let Some(v) = get("LINE_BOT_CHANNEL_TOKEN") {
            self.line.channel_token = Some(v);
        }
        if let Some(v) = get("API_KEY") {
            self.search.api_key = Some(v);
        }
        if let Some(v) = get("PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("invalid PORT value: {}", v))?;
        }
        Ok(())
    }
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RESTOBOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"))
}

/// Env file named by RESTOBOT_ENV_FILE (or GO_ENV, kept for existing deployments), if set.
pub fn default_env_file() -> Option<PathBuf> {
    ["RESTOBOT_ENV_FILE", "GO_ENV"]
        .iter()
        .filter_map(|k| std::env::var(k).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Read `KEY=value` pairs from a dotenv-style file. A missing file is an error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("reading env file {}", path.display()))?;
    let mut vars = HashMap::new();
    for item in iter {
        let (k, v) = item.with_context(|| format!("parsing env file {}", path.display()))?;
        vars.insert(k, v);
    }
    Ok(vars)
}

/// Load config from the given path (or RESTOBOT_CONFIG_PATH / ./config.json), then apply env overrides.
/// Missing config file => defaults. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    load_config_with(path, default_env_file(), |k| std::env::var(k).ok())
}

/// Like [`load_config`] with an explicit env file and variable lookup.
/// Variables from `lookup` win over the env file, which pre-populates only what is unset.
pub fn load_config_with<F>(
    path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    lookup: F,
) -> Result<(Config, PathBuf)>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    let file_vars = match env_file {
        Some(ref f) => {
            let vars = read_env_file(f)?;
            log::debug!("loaded {} variables from {}", vars.len(), f.display());
            vars
        }
        None => HashMap::new(),
    };
    config.apply_env(|k| {
        lookup(k)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| file_vars.get(k).cloned())
    })?;
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.server.bind, "0.0.0.0");
        assert_eq!(c.line.api_base, "https://api.line.me");
        assert_eq!(c.search.timeout(), Duration::from_secs(5));
        assert_eq!(
            c.missing(),
            vec!["LINE_BOT_CHANNEL_SECRET", "LINE_BOT_CHANNEL_TOKEN", "API_KEY"]
        );
        assert!(c.validate().is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut c: Config = serde_json::from_str(
            r#"{"line":{"channelSecret":"file-secret"},"search":{"apiKey":"file-key","timeoutSecs":3}}"#,
        )
        .unwrap();
        let vars = env(&[
            ("LINE_BOT_CHANNEL_SECRET", "env-secret"),
            ("LINE_BOT_CHANNEL_TOKEN", "env-token"),
            ("API_KEY", "  "),
            ("PORT", "9000"),
        ]);
        c.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(c.line.channel_secret.as_deref(), Some("env-secret"));
        assert_eq!(c.line.channel_token.as_deref(), Some("env-token"));
        assert_eq!(c.search.api_key.as_deref(), Some("file-key"));
        assert_eq!(c.search.timeout_secs, 3);
        assert_eq!(c.server.port, 9000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut c = Config::default();
        let vars = env(&[("PORT", "http")]);
        assert!(c.apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("restobot-no-such-config.json");
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(c.search.endpoint, default_search_endpoint());
    }

    fn temp_env_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("restobot-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).expect("write env file");
        path
    }

    #[test]
    fn env_file_prepopulates_unset_values() {
        let env_file = temp_env_file(
            "# local secrets\nLINE_BOT_CHANNEL_SECRET=file-secret\nLINE_BOT_CHANNEL_TOKEN=file-token\nAPI_KEY=file-key\nPORT=7070\n",
        );
        let config_path = std::env::temp_dir().join("restobot-no-such-config.json");
        let vars = env(&[("API_KEY", "process-key")]);
        let (c, _) =
            load_config_with(Some(config_path), Some(env_file.clone()), |k| vars.get(k).cloned())
                .unwrap();
        let _ = std::fs::remove_file(&env_file);
        assert_eq!(c.line.channel_secret.as_deref(), Some("file-secret"));
        assert_eq!(c.line.channel_token.as_deref(), Some("file-token"));
        assert_eq!(c.search.api_key.as_deref(), Some("process-key"));
        assert_eq!(c.server.port, 7070);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let env_file = std::env::temp_dir().join(format!("restobot-{}.env", uuid::Uuid::new_v4()));
        let err = load_config_with(None, Some(env_file), |_| None).unwrap_err();
        assert!(format!("{:#}", err).contains("reading env file"));
    }
}
