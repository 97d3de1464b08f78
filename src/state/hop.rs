use std::fmt;
use std::net::Ipv6Addr;

use crate::probe::Classification;

/// Identifies one transmitted echo request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeState {
    pub identifier: u16,
    pub sequence: u16,
    pub hop_limit: u8,
    /// 1-based attempt index within the hop
    pub attempt: u8,
    /// Length of the probe in the send buffer
    pub len: usize,
}

/// Result of a single attempt at a given hop limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Nothing matched before the timeout
    NoReply,
    /// Time Exceeded from an intermediate router
    Hop(Ipv6Addr),
    /// Destination Unreachable
    Unreachable(Ipv6Addr),
    /// Echo Reply from the target
    Reached(Ipv6Addr),
}

impl AttemptOutcome {
    pub fn responder(&self) -> Option<Ipv6Addr> {
        match self {
            Self::NoReply => None,
            Self::Hop(addr) | Self::Unreachable(addr) | Self::Reached(addr) => Some(*addr),
        }
    }

    /// Whether this outcome ends the trace
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Reached(_))
    }
}

impl From<Classification> for AttemptOutcome {
    fn from(c: Classification) -> Self {
        match c {
            Classification::NoMatch => Self::NoReply,
            Classification::TimeExceeded(addr) => Self::Hop(addr),
            Classification::Unreachable(addr) => Self::Unreachable(addr),
            Classification::EchoReply(addr) => Self::Reached(addr),
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReply => write!(f, "*"),
            Self::Hop(addr) | Self::Reached(addr) => write!(f, "{}", addr),
            Self::Unreachable(addr) => write!(f, "{}!X", addr),
        }
    }
}

/// All attempts made at one hop limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopResult {
    pub hop_limit: u8,
    pub attempts: Vec<AttemptOutcome>,
}

impl HopResult {
    pub fn new(hop_limit: u8) -> Self {
        Self {
            hop_limit,
            attempts: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: AttemptOutcome) {
        self.attempts.push(outcome);
    }

    /// Destination answered at this hop
    pub fn reached(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a, AttemptOutcome::Reached(_)))
    }

    /// Destination reported unreachable at this hop
    pub fn unreachable(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a, AttemptOutcome::Unreachable(_)))
    }

    pub fn is_terminal(&self) -> bool {
        self.attempts.iter().any(AttemptOutcome::is_terminal)
    }
}

impl fmt::Display for HopResult {
    /// `<hop_limit>  <result1>  <result2> ...`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hop_limit)?;
        for attempt in &self.attempts {
            write!(f, "  {}", attempt)?;
        }
        Ok(())
    }
}

/// How a trace ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Echo Reply received from the target
    Reached,
    /// Destination Unreachable received
    Unreachable,
    /// Maximum hop limit probed without a terminal response
    HopLimitExhausted,
}

/// Complete record of a trace run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub hops: Vec<HopResult>,
    pub outcome: TraceOutcome,
}

impl TraceSummary {
    /// Hop limit at which the trace stopped, if any hop was probed
    pub fn last_hop(&self) -> Option<u8> {
        self.hops.last().map(|h| h.hop_limit)
    }
}
