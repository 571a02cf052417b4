//! FTP-style service
//!
//! Control-channel impersonation only: numeric reply codes, CRLF framing,
//! no data channel. Login lines arrive as `USER x` / `PASS y`, so the
//! profile strips those prefixes before the credential check.

use std::sync::Arc;

use crate::config::HoneypotConfig;
use crate::script::{CommandRule, CommandScript};
use crate::session::ServiceProfile;

/// Fake FTP control vocabulary.
pub fn ftp_script() -> CommandScript {
    let mut s = CommandScript::new("500 Unknown command.").with_fallback_latency_ms(100, 400);

    s.add("syst", CommandRule::new("215 UNIX Type: L8"));
    s.add("pwd", CommandRule::new("257 \"/\" is the current directory").latency_ms(300));
    s.add(
        "list",
        CommandRule::new(
            "150 Opening ASCII mode data connection for file list.\r\n\
             drwxr-xr-x    2 admin    admin        4096 Mar 20 12:00 files\r\n\
             drwxr-xr-x    2 admin    admin        4096 Mar 20 12:01 logs\r\n\
             226 Transfer complete.",
        )
        .latency_ms(700),
    );
    s.add("noop", CommandRule::new("200 NOOP ok."));
    s.add("mkd test", CommandRule::new("257 \"test\" directory created.").latency_ms(800));
    s.add("dele file1", CommandRule::new("550 Permission denied."));
    s.add(
        "stor backdoor",
        CommandRule::new("550 Permission denied.")
            .latency_ms(1000)
            .suspicious(),
    );
    s.add("retr secret", CommandRule::new("550 File not found.").latency_ms(1000));
    s.add("quit", CommandRule::new("221 Goodbye."));

    s
}

pub fn ftp_profile(config: &HoneypotConfig) -> Arc<ServiceProfile> {
    Arc::new(ServiceProfile {
        name: "ftp",
        banner: "220 FTP Server ready.\r\n".to_string(),
        login_prompt: "331 Username required.\r\n".to_string(),
        password_prompt: "331 Password required.\r\n".to_string(),
        login_success: "230 Login successful.".to_string(),
        login_failure: "530 Login incorrect.".to_string(),
        blocked_message: "421 Service not available, closing control connection.".to_string(),
        // FTP has no shell prompt; the client just sends commands.
        prompt: String::new(),
        line_ending: "\r\n",
        terminal_command: "quit".to_string(),
        user_prefix: Some("USER ".to_string()),
        pass_prefix: Some("PASS ".to_string()),
        username: config.username.clone(),
        password: config.password.clone(),
        script: ftp_script(),
        suspicious_patterns: config.suspicious_patterns.clone(),
        idle_timeout: config.idle_timeout(),
    })
}
