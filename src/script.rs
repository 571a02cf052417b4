//! Scripted command tables
//!
//! A [`CommandScript`] is a static mapping from normalized command text to a
//! canned response, a simulated execution latency, and a suspicion flag.
//! Loaded once at service startup, read-only afterwards - sessions share it
//! without locking.

use rand::RngExt;
use std::collections::HashMap;
use std::time::Duration;

/// One scripted command: what to answer, how long to pretend it took, and
/// whether the command itself is attack tooling.
#[derive(Debug, Clone)]
pub struct CommandRule {
    pub response: String,
    pub latency: Duration,
    pub suspicious: bool,
}

impl CommandRule {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            latency: Duration::ZERO,
            suspicious: false,
        }
    }

    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency = Duration::from_millis(ms);
        self
    }

    pub fn suspicious(mut self) -> Self {
        self.suspicious = true;
        self
    }
}

/// Static command-to-response table for one impersonated service.
#[derive(Debug, Clone)]
pub struct CommandScript {
    rules: HashMap<String, CommandRule>,
    /// "not found" template; `{}` is replaced with the command text.
    not_found: String,
    /// Jitter range (ms) applied to commands without an explicit latency,
    /// so even unknown input looks like it cost something to run.
    fallback_latency_ms: Option<(u64, u64)>,
}

impl CommandScript {
    pub fn new(not_found: impl Into<String>) -> Self {
        Self {
            rules: HashMap::new(),
            not_found: not_found.into(),
            fallback_latency_ms: None,
        }
    }

    pub fn with_fallback_latency_ms(mut self, lo: u64, hi: u64) -> Self {
        self.fallback_latency_ms = Some((lo, hi));
        self
    }

    /// Register a rule under its normalized command text.
    pub fn add(&mut self, command: &str, rule: CommandRule) {
        self.rules.insert(normalize(command), rule);
    }

    /// Exact lookup against normalized command text. Pure and stateless:
    /// the same input always yields the same rule.
    pub fn lookup(&self, normalized: &str) -> Option<&CommandRule> {
        self.rules.get(normalized)
    }

    /// Protocol-flavoured "command not found" line.
    pub fn unknown_response(&self, command: &str) -> String {
        self.not_found.replace("{}", command)
    }

    /// Simulated execution latency for a lookup result.
    pub fn latency_for(&self, rule: Option<&CommandRule>) -> Duration {
        match rule {
            Some(r) if !r.latency.is_zero() => r.latency,
            _ => match self.fallback_latency_ms {
                Some((lo, hi)) => {
                    Duration::from_millis(rand::rng().random_range(lo..hi))
                }
                None => Duration::ZERO,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Trim and case-fold command input. Empty output means "ignore this line".
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Substring containment against the configured suspicious-pattern set.
/// Deliberately independent of whether the command is scripted: known attack
/// tooling gets recorded even when we answer it normally.
pub fn matches_suspicious<'a>(patterns: &'a [String], normalized: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|p| !p.is_empty() && normalized.contains(p.as_str()))
        .map(|p| p.as_str())
}
