use std::time::Duration;

use crate::cli::Args;

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Time to wait for a response to each probe
    pub timeout: Duration,
    /// Probes sent per hop limit
    pub attempts: u8,
    /// Highest hop limit probed
    pub max_hop_limit: u8,
    /// Interface the probes are sent from
    pub interface: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
            max_hop_limit: 30,
            interface: "eth0".to_string(),
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            timeout: args.timeout_duration(),
            attempts: args.attempts,
            max_hop_limit: args.max_hops,
            interface: args.interface.clone(),
        }
    }
}
