//! Runtime configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
///
/// Built once from the environment at startup and passed into each component;
/// no component reads ambient process state directly.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The server's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,

    /// The URL scheme used for all cluster member endpoints.
    #[serde(default = "Config::default_scheme")]
    pub scheme: String,
    /// The port which client network traffic is to use.
    #[serde(default = "Config::default_client_port")]
    pub client_port: u16,
    /// The port which cluster internal peer-protocol traffic is to use.
    #[serde(default = "Config::default_server_port")]
    pub server_port: u16,

    /// Base URL of the compute group API providing the live-instance roster.
    pub group_api_endpoint: String,
    /// Base URL of the instance metadata service.
    #[serde(default = "Config::default_metadata_endpoint")]
    pub metadata_endpoint: String,
    /// The cloud region of the compute group, required for bootstrap.
    pub region: Option<String>,
    /// The compute group API access key, required for bootstrap.
    pub access_key: Option<String>,
    /// The compute group API secret key, required for bootstrap.
    pub secret_key: Option<String>,

    /// The DNS record under which roster addresses are published.
    ///
    /// DNS publishing is skipped when this or `dns_api_endpoint` is unset.
    /// Healthcheck mode requires it.
    pub dns_record: Option<String>,
    /// Base URL of the DNS API used for record upserts.
    pub dns_api_endpoint: Option<String>,

    /// Per-call timeout in seconds applied to every individual network call.
    #[serde(default = "Config::default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
    /// Max attempts for each eviction/registration call.
    #[serde(default = "Config::default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed delay in seconds between retry attempts.
    #[serde(default = "Config::default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    /// Path of the one-time bootstrap marker file.
    #[serde(default = "Config::default_marker_path")]
    pub marker_path: String,
    /// Path of the storage engine binary to exec once bootstrap completes.
    #[serde(default = "Config::default_engine_bin")]
    pub engine_bin: String,
    /// The storage engine's data directory.
    #[serde(default = "Config::default_data_dir")]
    pub data_dir: String,
    /// The shell binary used by the `shell` mode.
    #[serde(default = "Config::default_shell_bin")]
    pub shell_bin: String,

    /// Interval in seconds between health monitor cycles.
    #[serde(default = "Config::default_healthcheck_interval_seconds")]
    pub healthcheck_interval_seconds: u64,
    /// The path of each member's health endpoint.
    #[serde(default = "Config::default_health_path")]
    pub health_path: String,
    /// The port used to expose prometheus metrics in healthcheck mode.
    #[serde(default = "Config::default_metrics_port")]
    pub metrics_port: u16,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that. In the future, this may take into account an optional config file as
    /// well.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        envy::from_env().context("error building config from env")
    }

    /// The per-call timeout applied to every individual network call.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// The fixed delay between registrar retry attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// The interval between health monitor cycles.
    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_seconds)
    }

    fn default_scheme() -> String {
        "http".into()
    }

    fn default_client_port() -> u16 {
        2379
    }

    fn default_server_port() -> u16 {
        2380
    }

    fn default_metadata_endpoint() -> String {
        "http://169.254.169.254/latest/meta-data".into()
    }

    fn default_probe_timeout_seconds() -> u64 {
        5
    }

    fn default_retry_attempts() -> u32 {
        12
    }

    fn default_retry_delay_seconds() -> u64 {
        2
    }

    fn default_marker_path() -> String {
        "/var/lib/quorumkv/bootstrap.state".into()
    }

    fn default_engine_bin() -> String {
        "/usr/local/bin/quorumkv".into()
    }

    fn default_data_dir() -> String {
        "/var/lib/quorumkv/data".into()
    }

    fn default_shell_bin() -> String {
        "/bin/sh".into()
    }

    fn default_healthcheck_interval_seconds() -> u64 {
        30
    }

    fn default_health_path() -> String {
        "/health".into()
    }

    fn default_metrics_port() -> u16 {
        7002
    }
}

#[cfg(test)]
impl Config {
    /// Create a new config instance for testing, rooted in a tempdir.
    pub fn new_test() -> Result<(Self, tempfile::TempDir)> {
        let tmpdir = tempfile::tempdir().context("error creating tempdir for test config")?;
        let marker_path = tmpdir.path().join("bootstrap.state").display().to_string();
        let config: Config = envy::from_iter(vec![
            ("RUST_LOG".into(), "error".into()),
            ("GROUP_API_ENDPOINT".into(), "http://localhost:9999".into()),
            ("REGION".into(), "us-east-1".into()),
            ("ACCESS_KEY".into(), "test-access".into()),
            ("SECRET_KEY".into(), "test-secret".into()),
            ("MARKER_PATH".into(), marker_path),
            ("RETRY_DELAY_SECONDS".into(), "0".into()),
        ])?;
        Ok((config, tmpdir))
    }
}
