//! Server configuration module
//!
//! Parses honeypot configuration from YAML files via serde_yaml: the struct
//! definition is the schema, every field carries its own default, and
//! validation runs once at load time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main honeypot configuration
///
/// This struct is automatically parsed from YAML by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotConfig {
    // ============================================
    // Listening Services
    // ============================================
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default = "default_telnet_port")]
    pub telnet_port: u16,

    #[serde(default = "default_ftp_port")]
    pub ftp_port: u16,

    // ============================================
    // Fake Credentials
    // ============================================
    /// The single credential pair the honeypot accepts.
    /// Deliberately weak - the point is to look plausible, not to be secure.
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    // ============================================
    // Ban Policy
    // ============================================
    /// Failures within the observation window before an identity is banned.
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: usize,

    /// Trailing window (seconds) over which failures are counted.
    #[serde(default = "default_observation_window_secs")]
    pub observation_window_secs: u64,

    /// How long (seconds) a ban stays active.
    #[serde(default = "default_ban_duration_secs")]
    pub ban_duration_secs: u64,

    /// Interval (seconds) between background sweeps of stale records.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds of client inactivity before a session is dropped.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Whether a ban also invokes the OS firewall block action.
    #[serde(default)]
    pub enable_firewall: bool,

    /// Substring patterns that mark a command as suspicious.
    #[serde(default = "default_suspicious_patterns")]
    pub suspicious_patterns: Vec<String>,

    // ============================================
    // Storage Paths
    // ============================================
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// ============================================
// Default value functions
// These are called by serde when a field is missing
// ============================================

fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_ssh_port() -> u16 {
    2222
}

fn default_telnet_port() -> u16 {
    2323
}

fn default_ftp_port() -> u16 {
    2121
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

fn default_ban_threshold() -> usize {
    5
}

fn default_observation_window_secs() -> u64 {
    300
}

fn default_ban_duration_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    1800
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_suspicious_patterns() -> Vec<String> {
    // "nc " keeps the trailing space so "sync" and friends don't match.
    [
        "wget", "curl", "nmap", "hydra", "netcat", "nc ", "chmod +x",
        "python -c", "perl -e", "bash -i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_db_path() -> String {
    "data/honeypot.db".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        // Serde fills every field from its default function.
        serde_yaml::from_str("{}").expect("default config must parse")
    }
}

impl HoneypotConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: HoneypotConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    ///
    /// Useful for testing
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: HoneypotConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.bind_ip.is_empty(), "bind_ip cannot be empty");
        anyhow::ensure!(!self.username.is_empty(), "username cannot be empty");
        anyhow::ensure!(!self.password.is_empty(), "password cannot be empty");

        anyhow::ensure!(self.ban_threshold >= 1, "ban_threshold must be at least 1");
        anyhow::ensure!(
            self.observation_window_secs > 0,
            "observation_window_secs must be positive"
        );
        anyhow::ensure!(
            self.ban_duration_secs > 0,
            "ban_duration_secs must be positive"
        );
        anyhow::ensure!(
            self.idle_timeout_secs > 0,
            "idle_timeout_secs must be positive"
        );

        // Three services, three distinct ports
        anyhow::ensure!(
            self.ssh_port != self.telnet_port
                && self.ssh_port != self.ftp_port
                && self.telnet_port != self.ftp_port,
            "service ports must be distinct: ssh={} telnet={} ftp={}",
            self.ssh_port,
            self.telnet_port,
            self.ftp_port
        );

        Ok(())
    }

    /// Save configuration to a YAML file
    ///
    /// Useful for generating config templates
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn observation_window(&self) -> Duration {
        Duration::from_secs(self.observation_window_secs)
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
