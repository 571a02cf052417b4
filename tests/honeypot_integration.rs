use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use netsnare::audit::AuditSink;
use netsnare::config::HoneypotConfig;
use netsnare::network::firewall::NoopBlock;
use netsnare::network::tracker::{BanTracker, FailureKind};
use netsnare::servers::{ftp, shell};
use netsnare::session::{ServiceProfile, Session};

async fn start_test_server(
    profile: Arc<ServiceProfile>,
    threshold: usize,
) -> (SocketAddr, Arc<BanTracker>) {
    let (audit, mut audit_rx) = AuditSink::channel(256);
    // drain audit records so the channel never fills up mid-test
    tokio::spawn(async move { while audit_rx.recv().await.is_some() {} });

    let tracker = Arc::new(BanTracker::new(
        threshold,
        Duration::from_secs(60),
        Duration::from_secs(60),
        audit.clone(),
        Arc::new(NoopBlock),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let t = Arc::clone(&tracker);
    tokio::spawn(async move {
        loop {
            let (stream, peer) = listener.accept().await.unwrap();
            let session = Session::new(
                stream,
                peer.ip(),
                Arc::clone(&profile),
                Arc::clone(&t),
                audit.clone(),
            );
            tokio::spawn(session.run());
        }
    });

    (addr, tracker)
}

/// Send everything up front, then collect the whole server side of the
/// conversation until it hangs up.
async fn converse(addr: SocketAddr, input: &str) -> String {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(input.as_bytes()).await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    output
}

#[tokio::test]
async fn test_telnet_banner_and_failed_login() {
    let config = HoneypotConfig::default();
    let (addr, tracker) = start_test_server(shell::telnet_profile(&config), 5).await;

    let out = converse(addr, "root\r\ntoor\r\n").await;

    assert!(out.contains("Unauthorized access is prohibited."));
    assert!(out.contains("login: "));
    assert!(out.contains("Login incorrect."));

    let identity = "127.0.0.1".parse().unwrap();
    assert_eq!(tracker.failure_count(identity), 1);
    assert!(!tracker.is_banned(identity));
}

#[tokio::test]
async fn test_telnet_full_session() {
    let config = HoneypotConfig::default();
    let (addr, _tracker) = start_test_server(shell::telnet_profile(&config), 5).await;

    let out = converse(addr, "admin\r\nadmin\r\nwhoami\r\nexit\r\n").await;

    assert!(out.contains("Welcome to the system."));
    assert!(out.contains("admin\r\n"), "whoami response missing: {out:?}");
    assert!(out.contains("logout"));
}

#[tokio::test]
async fn test_banned_identity_is_rejected_at_greeting() {
    let config = HoneypotConfig::default();
    let (addr, tracker) = start_test_server(shell::telnet_profile(&config), 1).await;

    let identity = "127.0.0.1".parse().unwrap();
    tracker.record_failure(identity, FailureKind::FailedLogin);
    assert!(tracker.is_banned(identity));

    let out = converse(addr, "").await;

    assert!(out.contains("temporarily blocked"));
    assert!(!out.contains("login: "), "no credential prompt for a ban");
}

#[tokio::test]
async fn test_repeated_failures_lead_to_ban() {
    let config = HoneypotConfig::default();
    let (addr, tracker) = start_test_server(shell::telnet_profile(&config), 3).await;
    let identity = "127.0.0.1".parse().unwrap();

    for _ in 0..3 {
        let out = converse(addr, "root\r\nhunter2\r\n").await;
        assert!(out.contains("Login incorrect."));
    }
    assert!(tracker.is_banned(identity));

    // the next connection only ever sees the block message
    let out = converse(addr, "admin\r\nadmin\r\n").await;
    assert!(out.contains("temporarily blocked"));
    assert!(!out.contains("Welcome"));
}

#[tokio::test]
async fn test_ftp_session_over_tcp() {
    let config = HoneypotConfig::default();
    let (addr, _tracker) = start_test_server(ftp::ftp_profile(&config), 5).await;

    let out = converse(addr, "USER admin\r\nPASS admin\r\nSYST\r\nQUIT\r\n").await;

    assert!(out.starts_with("220 FTP Server ready."));
    assert!(out.contains("230 Login successful."));
    assert!(out.contains("215 UNIX Type: L8"));
    assert!(out.contains("221 Goodbye."));
}

#[tokio::test]
async fn test_ftp_wrong_password_gets_530() {
    let config = HoneypotConfig::default();
    let (addr, tracker) = start_test_server(ftp::ftp_profile(&config), 5).await;

    let out = converse(addr, "USER admin\r\nPASS letmein\r\n").await;

    assert!(out.contains("530 Login incorrect."));
    assert_eq!(tracker.failure_count("127.0.0.1".parse().unwrap()), 1);
}
