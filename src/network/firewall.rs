//! OS-level block action
//!
//! When the ban tracker issues a ban it can additionally ask the host to
//! drop future packets from that address. The capability is a single narrow
//! trait so the tracker never depends on a specific OS mechanism, and a
//! failed block degrades to in-process enforcement only.

use anyhow::Result;
use std::net::IpAddr;
use std::process::Stdio;

/// Request that the underlying network stack drop packets from `identity`.
pub trait BlockAction: Send + Sync {
    fn block(&self, identity: IpAddr) -> Result<()>;
}

/// Appends an iptables DROP rule for the address.
///
/// The child process is not awaited: the tracker must never stall on the
/// firewall, and tokio reaps the child when the handle is dropped.
pub struct IptablesBlock;

impl BlockAction for IptablesBlock {
    fn block(&self, identity: IpAddr) -> Result<()> {
        let child = tokio::process::Command::new("iptables")
            .args(["-A", "INPUT", "-s", &identity.to_string(), "-j", "DROP"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        drop(child);
        tracing::info!("[firewall] [drop_rule_added] ip={}", identity);
        Ok(())
    }
}

/// In-process enforcement only; the tracker's own banned check stays
/// authoritative.
pub struct NoopBlock;

impl BlockAction for NoopBlock {
    fn block(&self, _identity: IpAddr) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_noop_block_always_succeeds() {
        let block = NoopBlock;
        assert!(block.block(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))).is_ok());
    }
}
