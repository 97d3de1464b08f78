use clap::Parser;
use std::net::Ipv6Addr;
use std::time::Duration;

/// Trace the IPv6 forwarding path to a host with ICMPv6 echo probes
#[derive(Parser, Debug, Clone)]
#[command(name = "trace6")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target IPv6 address
    #[arg(required = true)]
    pub target: String,

    /// Seconds to wait for a response to each probe
    #[arg(short = 't', long = "timeout", default_value = "5")]
    pub timeout: f64,

    /// Probes per hop
    #[arg(short = 'q', long = "attempts", default_value = "3")]
    pub attempts: u8,

    /// Maximum hop limit
    #[arg(short = 'm', long = "max-hops", default_value = "30")]
    pub max_hops: u8,

    /// Interface to send probes from
    #[arg(short = 'i', long = "interface", default_value = "eth0")]
    pub interface: String,
}

/// Longest per-probe timeout accepted, in seconds
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

impl Args {
    /// Get timeout as Duration. Out-of-range values are clamped; `validate`
    /// rejects them first.
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout.clamp(0.0, MAX_TIMEOUT_SECS)).unwrap_or_default()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.target.parse::<Ipv6Addr>().is_err() {
            return Err(format!(
                "Invalid target: {} (expected an IPv6 address)",
                self.target
            ));
        }

        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }
        if self.timeout > MAX_TIMEOUT_SECS
            || Duration::try_from_secs_f64(self.timeout).is_err()
        {
            return Err(format!(
                "Timeout cannot exceed {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }

        if self.attempts == 0 {
            return Err("Attempts must be at least 1".into());
        }

        if self.max_hops == 0 {
            return Err("Max hops must be at least 1".into());
        }

        if self.interface.is_empty() {
            return Err("Interface name cannot be empty".into());
        }
        // IFNAMSIZ on Linux is 16 including null terminator
        if self.interface.len() > 15 {
            return Err(format!(
                "Interface name too long: {} (max 15 chars)",
                self.interface
            ));
        }

        Ok(())
    }
}
