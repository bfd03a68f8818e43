//! Configuration module for the tweet service.
//!
//! This module reads the service configuration from environment variables.

use log::{info, warn};
use std::env;
use std::time::Duration;

/// Cron expression for the scheduled-tweet publisher: second 0 of every minute.
pub const DEFAULT_PUBLISH_CRON: &str = "0 * * * * *";

/// Default timeout for fetching link previews.
pub const DEFAULT_LINK_PREVIEW_TIMEOUT_SECS: u64 = 5;

/// Service configuration.
///
/// | Variable | Default | Meaning |
/// |---|---|---|
/// | `PORT` | `3000` | HTTP port |
/// | `DATABASE_URL` | unset | PostgreSQL connection string; unset runs on the in-memory store |
/// | `LINK_PREVIEWS` | `false` | fetch title/description/cover of linked pages |
/// | `LINK_PREVIEW_TIMEOUT_SECS` | `5` | timeout for a preview fetch |
/// | `SCHEDULED_PUBLISH_CRON` | `0 * * * * *` | schedule of the scheduled-tweet publisher |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub link_previews: bool,
    pub link_preview_timeout: Duration,
    pub publish_cron: String,
}

impl AppConfig {
    /// Loads the configuration from the environment.
    ///
    /// # Panics
    ///
    /// Panics if `PORT` is set to something that is not a port number (see
    /// [`get_server_port`]).
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL is not set, tweets will be kept in memory only");
        }

        let link_previews = env::var("LINK_PREVIEWS")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        let link_preview_timeout = env::var("LINK_PREVIEW_TIMEOUT_SECS")
            .ok()
            .and_then(|value| match value.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!(
                        "Ignoring invalid LINK_PREVIEW_TIMEOUT_SECS '{}', using {}s",
                        value, DEFAULT_LINK_PREVIEW_TIMEOUT_SECS
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_LINK_PREVIEW_TIMEOUT_SECS);

        let publish_cron =
            env::var("SCHEDULED_PUBLISH_CRON").unwrap_or_else(|_| DEFAULT_PUBLISH_CRON.to_string());

        let config = AppConfig {
            port: get_server_port(),
            database_url,
            link_previews,
            link_preview_timeout: Duration::from_secs(link_preview_timeout),
            publish_cron,
        };
        info!(
            "Loaded configuration: port {}, database {}, link previews {}",
            config.port,
            if config.database_url.is_some() {
                "postgres"
            } else {
                "in-memory"
            },
            config.link_previews
        );
        config
    }
}

/// Interprets `1`, `true`, `yes` and `on` (any case) as enabled.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Gets the server port from environment variables.
///
/// This function reads the `PORT` environment variable and returns it as a u16.
/// If the variable is not set, it defaults to port 3000.
///
/// # Returns
///
/// The port number as a u16.
///
/// # Panics
///
/// This function will panic if the `PORT` environment variable is set to a value
/// that cannot be parsed as a valid port number.
///
/// # Example
///
/// ```rust
/// use tweet_service::get_server_port;
///
/// // With no PORT set
/// std::env::remove_var("PORT");
/// assert_eq!(get_server_port(), 3000);
/// ```
pub fn get_server_port() -> u16 {
    env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .expect("PORT must be a valid number")
}
