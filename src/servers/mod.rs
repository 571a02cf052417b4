//! Impersonated services
//!
//! One dispatcher per service: bind a listener, accept forever, one session
//! task per connection. Admission control is entirely the ban tracker's
//! per-identity policy; there is deliberately no global connection cap.

pub mod ftp;
pub mod shell;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::audit::AuditSink;
use crate::network::tracker::BanTracker;
use crate::session::{ServiceProfile, Session};

/// Accept loop for one impersonated service.
///
/// A bind failure is fatal to this service only - the caller decides whether
/// the rest of the process keeps going. Accept errors are logged and the
/// loop continues.
pub async fn run_service(
    profile: Arc<ServiceProfile>,
    bind_addr: String,
    tracker: Arc<BanTracker>,
    audit: AuditSink,
) -> Result<()> {
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("{}: cannot bind {}", profile.name, bind_addr))?;

    tracing::info!("[{}] [ready] addr={}", profile.name, bind_addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!("[{}] [accept] ip={}", profile.name, peer.ip());
                let session = Session::new(
                    stream,
                    peer.ip(),
                    Arc::clone(&profile),
                    Arc::clone(&tracker),
                    audit.clone(),
                );
                tokio::spawn(session.run());
            }
            Err(e) => {
                tracing::warn!("[{}] [accept_error] err={}", profile.name, e);
                continue;
            }
        }
    }
}
