//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::config::settings::Settings;
use crate::deploy::DeployOptions;
use crate::relay;
use crate::workers::session_sweeper;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// GitHub endpoints and OAuth app
    pub github: GitHubOptions,

    /// Deployment sequence options
    pub deploy: DeployOptions,

    /// Session options
    pub session: SessionOptions,

    /// Relay options
    pub relay: relay::Options,

    /// Session sweeper options
    pub session_sweeper: session_sweeper::Options,

    /// JSON file backing the store; in-memory when unset
    pub data_file: Option<PathBuf>,

    /// Where the browser lands after login
    pub frontend_url: String,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.host.clone(),
                port: settings.port,
                cors_origin: Some(settings.frontend_url.clone()),
            },
            github: GitHubOptions {
                api_url: settings.github.api_url.clone(),
                oauth_url: settings.github.oauth_url.clone(),
                client_id: settings.github.client_id.clone(),
                client_secret: SecretString::from(
                    settings.github.client_secret.expose_secret().to_string(),
                ),
                redirect_uri: settings.github.redirect_uri.clone(),
            },
            deploy: DeployOptions::from_target(&settings.target),
            session: SessionOptions {
                secret: SecretString::from(settings.session.secret.expose_secret().to_string()),
                ttl: Duration::from_secs(settings.session.ttl_secs),
                secure_cookie: settings.session.secure_cookie,
            },
            relay: relay::Options::default(),
            session_sweeper: session_sweeper::Options {
                interval: Duration::from_secs(settings.session.sweep_interval_secs),
            },
            data_file: settings.data_file.clone(),
            frontend_url: settings.frontend_url.clone(),
        }
    }
}

/// Lifecycle options for the launcher
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Frontend origin allowed to call the API with cookies
    pub cors_origin: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: None,
        }
    }
}

/// GitHub options
#[derive(Debug)]
pub struct GitHubOptions {
    pub api_url: String,
    pub oauth_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Option<String>,
}

/// Session options
#[derive(Debug)]
pub struct SessionOptions {
    pub secret: SecretString,
    pub ttl: Duration,
    pub secure_cookie: bool,
}
