//! Per-connection session state machine
//!
//! One [`Session`] per accepted connection, exclusively owned by its task.
//! The machine walks Greeting -> Authenticating -> Interactive -> Terminated
//! and never reaches any other state. Protocol flavour (banners, prompts,
//! line endings, command script) comes from a [`ServiceProfile`], so the
//! SSH-style, Telnet-style and FTP services all share this one engine.
//!
//! Any transport error, the idle deadline, or the terminal command moves the
//! session to Terminated; the connection is then shut down exactly once.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

use crate::audit::{AuditEvent, AuditSink};
use crate::network::tracker::{BanTracker, FailureKind};
use crate::script::{self, CommandScript};

/// Session-fatal conditions. All of them terminate the state machine; none
/// of them count as a failed login or a suspicious event.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("idle deadline exceeded ({0:?})")]
    IdleTimeout(Duration),

    #[error("connection closed by peer")]
    Disconnected,
}

/// The four reachable session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Greeting,
    Authenticating,
    Interactive,
    Terminated,
}

/// Everything protocol-specific about one impersonated service.
///
/// Immutable after startup; sessions share it behind an `Arc`.
pub struct ServiceProfile {
    pub name: &'static str,
    /// Written verbatim on accept (line endings included).
    pub banner: String,
    pub login_prompt: String,
    pub password_prompt: String,
    pub login_success: String,
    pub login_failure: String,
    /// The only thing a banned client ever sees.
    pub blocked_message: String,
    /// Written before each command read; empty for prompt-less protocols.
    pub prompt: String,
    pub line_ending: &'static str,
    /// Normalized command that ends the session after its scripted response.
    pub terminal_command: String,
    /// Optional login-line prefixes to strip (FTP's "USER " / "PASS ").
    pub user_prefix: Option<String>,
    pub pass_prefix: Option<String>,
    pub username: String,
    pub password: String,
    pub script: CommandScript,
    pub suspicious_patterns: Vec<String>,
    pub idle_timeout: Duration,
}

/// One fake interactive session over any line-oriented byte stream.
pub struct Session<S> {
    identity: IpAddr,
    profile: Arc<ServiceProfile>,
    tracker: Arc<BanTracker>,
    audit: AuditSink,
    state: SessionState,
    authenticated: bool,
    history: Vec<String>,
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> Session<S> {
    pub fn new(
        stream: S,
        identity: IpAddr,
        profile: Arc<ServiceProfile>,
        tracker: Arc<BanTracker>,
        audit: AuditSink,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            identity,
            profile,
            tracker,
            audit,
            state: SessionState::Greeting,
            authenticated: false,
            history: Vec::new(),
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Drive the state machine until Terminated, then close the connection.
    pub async fn run(mut self) {
        loop {
            let step = match self.state {
                SessionState::Greeting => self.greeting().await,
                SessionState::Authenticating => self.authenticate().await,
                SessionState::Interactive => self.interactive().await,
                SessionState::Terminated => break,
            };

            self.state = match step {
                Ok(next) => next,
                Err(e) => {
                    // Dead or idle connection; not a policy event.
                    tracing::debug!(
                        "[{}] [session_end] ip={} reason={}",
                        self.profile.name,
                        self.identity,
                        e
                    );
                    SessionState::Terminated
                }
            };
        }

        let _ = self.writer.shutdown().await;
        tracing::info!("[{}] [closed] ip={}", self.profile.name, self.identity);
    }

    /// Admission check plus banner.
    async fn greeting(&mut self) -> Result<SessionState, SessionError> {
        let profile = Arc::clone(&self.profile);

        self.audit
            .emit(self.identity, AuditEvent::ConnectionOpened, profile.name);

        if self.tracker.is_banned(self.identity) {
            // No credential prompt for banned identities, ever.
            tracing::info!("[{}] [rejected_banned] ip={}", profile.name, self.identity);
            self.write_line(&profile.blocked_message).await?;
            return Ok(SessionState::Terminated);
        }

        self.write_raw(&profile.banner).await?;
        Ok(SessionState::Authenticating)
    }

    /// Single-attempt credential challenge.
    async fn authenticate(&mut self) -> Result<SessionState, SessionError> {
        let profile = Arc::clone(&self.profile);

        self.write_raw(&profile.login_prompt).await?;
        let user_line = self.read_line().await?;
        self.write_raw(&profile.password_prompt).await?;
        let pass_line = self.read_line().await?;

        let username = strip_login_prefix(&user_line, profile.user_prefix.as_deref());
        let password = strip_login_prefix(&pass_line, profile.pass_prefix.as_deref());

        if username == profile.username && password == profile.password {
            self.authenticated = true;
            self.audit
                .emit(self.identity, AuditEvent::LoginSuccess, username);
            tracing::info!("[{}] [login_ok] ip={}", profile.name, self.identity);
            self.write_line(&profile.login_success).await?;
            return Ok(SessionState::Interactive);
        }

        // One attempt per connection; the tracker decides what happens on
        // the next one.
        self.tracker
            .record_failure(self.identity, FailureKind::FailedLogin);
        self.audit
            .emit(self.identity, AuditEvent::LoginFailed, username);
        tracing::info!("[{}] [login_failed] ip={}", profile.name, self.identity);
        self.write_line(&profile.login_failure).await?;
        Ok(SessionState::Terminated)
    }

    /// Scripted command loop under the idle deadline.
    async fn interactive(&mut self) -> Result<SessionState, SessionError> {
        let profile = Arc::clone(&self.profile);

        loop {
            if !profile.prompt.is_empty() {
                self.write_raw(&profile.prompt).await?;
            }

            let line = self.read_line().await?;
            let command = script::normalize(&line);
            if command.is_empty() {
                continue;
            }

            self.history.push(command.clone());
            self.audit
                .emit(self.identity, AuditEvent::CommandExecuted, &command);

            let rule = profile.script.lookup(&command);

            let suspicious = rule.map(|r| r.suspicious).unwrap_or(false)
                || script::matches_suspicious(&profile.suspicious_patterns, &command).is_some();
            if suspicious {
                // Recorded and penalized, but still answered normally below;
                // withholding the response would give the game away.
                tracing::warn!(
                    "[{}] [suspicious] ip={} cmd={:?}",
                    profile.name,
                    self.identity,
                    command
                );
                self.tracker
                    .record_failure(self.identity, FailureKind::SuspiciousCommand);
                self.audit
                    .emit(self.identity, AuditEvent::SuspiciousCommand, &command);
            }

            if command == "history" && rule.is_none() {
                let replay = self.history.join(profile.line_ending);
                self.write_line(&replay).await?;
                continue;
            }

            let latency = profile.script.latency_for(rule);
            let response = match rule {
                Some(r) => r.response.clone(),
                None => profile.script.unknown_response(&command),
            };

            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.write_line(&response).await?;

            if command == profile.terminal_command {
                return Ok(SessionState::Terminated);
            }
        }
    }

    /// One line under the idle deadline. Zero bytes means the peer is gone.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let deadline = self.profile.idle_timeout;
        let mut line = String::new();

        let n = tokio::time::timeout(deadline, self.reader.read_line(&mut line))
            .await
            .map_err(|_| SessionError::IdleTimeout(deadline))??;
        if n == 0 {
            return Err(SessionError::Disconnected);
        }
        Ok(line)
    }

    async fn write_raw(&mut self, text: &str) -> Result<(), SessionError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn write_line(&mut self, text: &str) -> Result<(), SessionError> {
        let ending = self.profile.line_ending;
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(ending.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Trim a login line, dropping a protocol prefix ("USER ", "PASS ") when
/// present. The prefix match is case-insensitive; the value is not.
fn strip_login_prefix(line: &str, prefix: Option<&str>) -> String {
    let line = line.trim();
    if let Some(prefix) = prefix {
        // get() guards against a multibyte char straddling the cut point
        if let Some(head) = line.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return line[prefix.len()..].trim().to_string();
            }
        }
    }
    line.to_string()
}
