//! Launcher settings
//!
//! Settings start from serde defaults, may be seeded from a JSON file and are
//! then overridden by environment variables (`.env` is loaded by `main`).

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::errors::LauncherError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Launcher settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Where the browser lands after login
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// JSON file backing the deployment store; in-memory when unset
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// GitHub OAuth app and API endpoints
    #[serde(default)]
    pub github: GitHubSettings,

    /// Upstream repository and the files written to each fork
    #[serde(default)]
    pub target: TargetSettings,

    /// Browser sessions
    #[serde(default)]
    pub session: SessionSettings,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_frontend_url() -> String {
    "/".to_string()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            data_file: None,
            github: GitHubSettings::default(),
            target: TargetSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

/// GitHub OAuth app settings
#[derive(Debug, Deserialize)]
pub struct GitHubSettings {
    #[serde(default)]
    pub client_id: String,

    #[serde(default = "empty_secret")]
    pub client_secret: SecretString,

    /// OAuth callback URL registered with the app; GitHub uses the app default when unset
    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_oauth_url() -> String {
    "https://github.com".to_string()
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: empty_secret(),
            redirect_uri: None,
            api_url: default_api_url(),
            oauth_url: default_oauth_url(),
        }
    }
}

/// Upstream repository settings
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSettings {
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default = "default_workflow_file")]
    pub workflow_file_name: String,

    #[serde(default = "default_config_path")]
    pub config_file_path: String,

    #[serde(default = "default_env_path")]
    pub env_file_path: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_workflow_file() -> String {
    "deploy.yml".to_string()
}

fn default_config_path() -> String {
    "config.js".to_string()
}

fn default_env_path() -> String {
    ".env".to_string()
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            default_branch: default_branch(),
            workflow_file_name: default_workflow_file(),
            config_file_path: default_config_path(),
            env_file_path: default_env_path(),
        }
    }
}

/// Session settings
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    /// HMAC secret for session cookies
    #[serde(default = "empty_secret")]
    pub secret: SecretString,

    /// Idle lifetime of a session in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Interval between expired session sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_session_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_sweep_interval() -> u64 {
    600
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: empty_secret(),
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            secure_cookie: false,
        }
    }
}

impl Settings {
    /// Load settings from an optional JSON file, then apply the process environment
    pub async fn load(file: Option<&File>) -> Result<Self, LauncherError> {
        let mut settings = match file {
            Some(file) => file.read_json::<Settings>().await?,
            None => Settings::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), LauncherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.parse().map_err(LauncherError::ConfigError)?;
        }
        if let Some(v) = lookup("LOG_JSON") {
            self.log_json = parse_bool("LOG_JSON", &v)?;
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.port = v
                .parse()
                .map_err(|_| LauncherError::ConfigError(format!("Invalid PORT: {}", v)))?;
        }
        if let Some(v) = lookup("FRONTEND_URL") {
            self.frontend_url = v;
        }
        if let Some(v) = lookup("DATA_FILE") {
            self.data_file = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("GITHUB_CLIENT_ID") {
            self.github.client_id = v;
        }
        if let Some(v) = lookup("GITHUB_CLIENT_SECRET") {
            self.github.client_secret = SecretString::from(v);
        }
        if let Some(v) = lookup("GITHUB_REDIRECT_URI") {
            self.github.redirect_uri = Some(v);
        }
        if let Some(v) = lookup("GITHUB_API_URL") {
            self.github.api_url = v;
        }
        if let Some(v) = lookup("GITHUB_OAUTH_URL") {
            self.github.oauth_url = v;
        }

        if let Some(v) = lookup("TARGET_REPO_OWNER") {
            self.target.owner = v;
        }
        if let Some(v) = lookup("TARGET_REPO_NAME") {
            self.target.repo = v;
        }
        if let Some(v) = lookup("DEFAULT_BRANCH") {
            self.target.default_branch = v;
        }
        if let Some(v) = lookup("WORKFLOW_FILE_NAME") {
            self.target.workflow_file_name = v;
        }
        if let Some(v) = lookup("CONFIG_FILE_PATH") {
            self.target.config_file_path = v;
        }
        if let Some(v) = lookup("ENV_FILE_PATH") {
            self.target.env_file_path = v;
        }

        if let Some(v) = lookup("SESSION_SECRET") {
            self.session.secret = SecretString::from(v);
        }
        if let Some(v) = lookup("SESSION_TTL_SECS") {
            self.session.ttl_secs = v.parse().map_err(|_| {
                LauncherError::ConfigError(format!("Invalid SESSION_TTL_SECS: {}", v))
            })?;
        }
        if let Some(v) = lookup("SESSION_SECURE_COOKIE") {
            self.session.secure_cookie = parse_bool("SESSION_SECURE_COOKIE", &v)?;
        }
        if let Some(v) = lookup("SESSION_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs = v.parse().map_err(|_| {
                LauncherError::ConfigError(format!("Invalid SESSION_SWEEP_INTERVAL_SECS: {}", v))
            })?;
        }

        Ok(())
    }

    /// Check that every required value is present
    pub fn validate(&self) -> Result<(), LauncherError> {
        let required = [
            ("GITHUB_CLIENT_ID", self.github.client_id.is_empty()),
            (
                "GITHUB_CLIENT_SECRET",
                self.github.client_secret.expose_secret().is_empty(),
            ),
            ("TARGET_REPO_OWNER", self.target.owner.is_empty()),
            ("TARGET_REPO_NAME", self.target.repo.is_empty()),
            ("SESSION_SECRET", self.session.secret.expose_secret().is_empty()),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(LauncherError::ConfigError(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.target.workflow_file_name.contains('/') {
            return Err(LauncherError::ConfigError(
                "WORKFLOW_FILE_NAME must be a file name, not a path".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, LauncherError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LauncherError::ConfigError(format!(
            "Invalid boolean for {}: {}",
            key, value
        ))),
    }
}
