//! Access control for incoming connections
//!
//! The ban tracker is the only state shared across sessions; the firewall
//! module is the narrow OS-level capability it invokes on a ban.

pub mod firewall;
pub mod tracker;
