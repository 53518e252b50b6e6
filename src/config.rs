//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.surveyd.toml` files.

use crate::cli::{Args, Command};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".surveyd.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Emotion classification settings.
    #[serde(default)]
    pub classifier: ClassifierSettings,

    /// Pass-through proxy settings.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static assets served at `/`.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Allow cross-origin requests.
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

/// Which [`crate::store::SurveyStore`] to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Survey document location (file backend).
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Survey document backend.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the blob store. When set, submissions are archived
    /// and the file endpoints are enabled.
    #[serde(default)]
    pub blob_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            backend: StorageBackend::default(),
            blob_root: None,
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("data/surveys.json")
}

/// Emotion classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Classify free-text answers after each submission.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the inference API; the model name is appended.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier.
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            model: default_classifier_model(),
            token_env: default_token_env(),
            timeout_seconds: default_classifier_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

fn default_classifier_model() -> String {
    "j-hartmann/emotion-english-distilroberta-base".to_string()
}

fn default_token_env() -> String {
    "HF_API_TOKEN".to_string()
}

fn default_classifier_timeout() -> u64 {
    15
}

impl ClassifierSettings {
    /// API token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Pass-through proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Port the proxy listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Backend every request is forwarded to.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_proxy_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            backend_url: default_backend_url(),
            timeout_seconds: default_proxy_timeout(),
        }
    }
}

fn default_listen_port() -> u16 {
    8080
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_proxy_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings and only
    /// override when explicitly provided.
    pub fn merge_with_args(&mut self, args: &Args) {
        match &args.command {
            Command::Serve(serve) => {
                if let Some(ref host) = serve.host {
                    self.server.host = host.clone();
                }
                if let Some(port) = serve.port {
                    self.server.port = port;
                }
                if let Some(ref data_file) = serve.data_file {
                    self.storage.data_file = data_file.clone();
                }
                if let Some(ref static_dir) = serve.static_dir {
                    self.server.static_dir = Some(static_dir.clone());
                }
                if let Some(ref blob_root) = serve.blob_root {
                    self.storage.blob_root = Some(blob_root.clone());
                }
                if serve.memory {
                    self.storage.backend = StorageBackend::Memory;
                }
                if serve.classify {
                    self.classifier.enabled = true;
                }
            }
            Command::Proxy(proxy) => {
                if let Some(port) = proxy.port {
                    self.proxy.listen_port = port;
                }
                if let Some(ref backend) = proxy.backend {
                    self.proxy.backend_url = backend.clone();
                }
                if let Some(timeout) = proxy.timeout {
                    self.proxy.timeout_seconds = timeout;
                }
            }
            Command::Report(report) => {
                if let Some(ref data_file) = report.data_file {
                    self.storage.data_file = data_file.clone();
                }
            }
            Command::InitConfig => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ProxyArgs, ServeArgs};

    fn args(command: Command) -> Args {
        Args {
            command,
            config: None,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.data_file, PathBuf::from("data/surveys.json"));
        assert!(!config.classifier.enabled);
        assert_eq!(config.proxy.backend_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
port = 4000
static_dir = "public"

[storage]
backend = "memory"
blob_root = "blobs"

[classifier]
enabled = true
model = "custom/model"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.blob_root, Some(PathBuf::from("blobs")));
        assert!(config.classifier.enabled);
        assert_eq!(config.classifier.model, "custom/model");
        assert_eq!(config.classifier.timeout_seconds, 15);
    }

    #[test]
    fn test_merge_serve_args() {
        let mut config = Config::default();
        config.server.port = 4000;

        config.merge_with_args(&args(Command::Serve(ServeArgs {
            host: None,
            port: Some(5000),
            data_file: Some(PathBuf::from("x.json")),
            static_dir: None,
            blob_root: None,
            memory: true,
            classify: false,
        })));

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.data_file, PathBuf::from("x.json"));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(!config.classifier.enabled);
    }

    #[test]
    fn test_merge_proxy_args_keeps_file_values() {
        let mut config = Config::default();
        config.proxy.timeout_seconds = 5;

        config.merge_with_args(&args(Command::Proxy(ProxyArgs {
            port: None,
            backend: Some("http://backend:3000".to_string()),
            timeout: None,
        })));

        assert_eq!(config.proxy.backend_url, "http://backend:3000");
        assert_eq!(config.proxy.listen_port, 8080);
        assert_eq!(config.proxy.timeout_seconds, 5);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[classifier]"));
        assert!(toml_str.contains("[proxy]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, 3000);
    }
}
