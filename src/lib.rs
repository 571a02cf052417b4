//! netsnare - multi-protocol honeypot
//!
//! Impersonates shell-style remote-access services and an FTP service,
//! records everything attackers do, and temporarily bans identities that
//! pile up failed logins or suspicious commands.

/// Server configuration (YAML)
pub mod config;
/// Structured audit event sink
pub mod audit;
/// Scripted command tables and lookup
pub mod script;
/// Per-connection session state machine
pub mod session;
/// Ban tracking and OS-level blocking
pub mod network;
/// Service dispatchers and per-protocol profiles
pub mod servers;
