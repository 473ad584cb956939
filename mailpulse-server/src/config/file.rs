//! TOML file configuration structures.
//!
//! These structs map directly to the `mailpulse-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub mailgun: MailgunSection,
    #[serde(default)]
    pub exporter: ExporterSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// The address and port the scrape endpoint listens on.
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 2112).into()
}

/// Mailgun account section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailgunSection {
    /// Sending domain whose event log is polled; also the metric
    /// dimension on every sample.
    pub domain: String,
    /// API root; override for the EU region endpoint.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.mailgun.net".to_string()
}

/// Poll cadence and correlation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterSection {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Distance between now and the newest edge of the query window.
    #[serde(default = "default_window_offset_secs")]
    pub window_offset_secs: u64,
    /// Width of the query window.
    #[serde(default = "default_window_width_secs")]
    pub window_width_secs: u64,
    /// Deadline covering one whole paged fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Hours an accepted event waits for its delivered/failed counterpart.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            window_offset_secs: default_window_offset_secs(),
            window_width_secs: default_window_width_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_window_offset_secs() -> u64 {
    120
}

fn default_window_width_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_retention_hours() -> u64 {
    10
}
