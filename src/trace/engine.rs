use std::io::Write;
use std::net::Ipv6Addr;
use tracing::{debug, error, trace};

use crate::config::Config;
use crate::error::TraceError;
use crate::probe::{
    Classification, IPV6_HEADER_SIZE, Ipv6Header, PROBE_SIZE, Transport, assemble_probe,
    build_echo_request, build_ipv6_header, classify, hex_dump,
};
use crate::state::{AttemptOutcome, HopResult, ProbeState, TraceOutcome, TraceSummary};

/// Size of the send and receive buffers (Ethernet MTU plus link header)
pub const FRAME_BUFFER_SIZE: usize = 1514;

/// Get process identifier for the ICMPv6 identifier field
pub fn get_identifier() -> u16 {
    std::process::id() as u16
}

/// Whether a received frame is addressed to `local`
fn addressed_to(frame: &[u8], local: &Ipv6Addr) -> bool {
    frame.len() >= IPV6_HEADER_SIZE && frame[24..40] == local.octets()
}

/// Drives hop-limit escalation: one probe outstanding at a time, results
/// written to `out` as they arrive.
pub struct ProbeLoop<T, W> {
    config: Config,
    transport: T,
    out: W,
    identifier: u16,
    /// Incremented once per probe for the whole run
    sequence: u16,
    send_buf: [u8; FRAME_BUFFER_SIZE],
    recv_buf: [u8; FRAME_BUFFER_SIZE],
}

impl<T: Transport, W: Write> ProbeLoop<T, W> {
    pub fn new(config: Config, transport: T, out: W) -> Self {
        Self {
            config,
            transport,
            out,
            identifier: get_identifier(),
            sequence: 0,
            send_buf: [0u8; FRAME_BUFFER_SIZE],
            recv_buf: [0u8; FRAME_BUFFER_SIZE],
        }
    }

    /// The transport probes are sent through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Trace the path to `target`, printing one line per hop limit.
    ///
    /// Stops at the first hop that yields an Echo Reply or Destination
    /// Unreachable, or after the configured maximum hop limit.
    pub fn run(&mut self, target: &str) -> Result<TraceSummary, TraceError> {
        let destination: Ipv6Addr = target
            .parse()
            .map_err(|_| TraceError::InvalidTarget(target.to_string()))?;
        let source = self
            .transport
            .local_ipv6_address()
            .map_err(|e| TraceError::transport("address lookup", e))?;

        debug!(
            "Tracing {} from {}, max {} hops, {} attempts, timeout {:?}",
            destination,
            source,
            self.config.max_hop_limit,
            self.config.attempts,
            self.config.timeout
        );

        let mut hops = Vec::new();
        let mut outcome = TraceOutcome::HopLimitExhausted;

        for hop_limit in 1..=self.config.max_hop_limit {
            let hop = self.probe_hop(hop_limit, source, destination)?;
            let terminal = hop.is_terminal();
            if terminal {
                outcome = if hop.reached() {
                    TraceOutcome::Reached
                } else {
                    TraceOutcome::Unreachable
                };
            }
            hops.push(hop);

            if terminal {
                break;
            }
        }

        Ok(TraceSummary {
            source,
            destination,
            hops,
            outcome,
        })
    }

    /// Send all attempts for one hop limit
    fn probe_hop(
        &mut self,
        hop_limit: u8,
        source: Ipv6Addr,
        destination: Ipv6Addr,
    ) -> Result<HopResult, TraceError> {
        write!(self.out, "{}", hop_limit)?;
        self.out.flush()?;

        let header = build_ipv6_header(hop_limit, source, destination);
        let mut hop = HopResult::new(hop_limit);

        for attempt in 1..=self.config.attempts {
            let probe = self.send_probe(&header, attempt)?;
            let outcome = AttemptOutcome::from(self.await_response(&probe, &source)?);

            write!(self.out, "  {}", outcome)?;
            self.out.flush()?;
            hop.record(outcome);

            if outcome.is_terminal() {
                break;
            }
        }

        writeln!(self.out)?;
        self.out.flush()?;
        Ok(hop)
    }

    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Build a fresh echo request into the send buffer and transmit it
    fn send_probe(&mut self, header: &Ipv6Header, attempt: u8) -> Result<ProbeState, TraceError> {
        let sequence = self.next_sequence();
        let echo = build_echo_request(self.identifier, sequence);
        let len = assemble_probe(&mut self.send_buf, header, &echo);

        trace!(
            "Probe hop_limit={} attempt={} id={:#06x} seq={}",
            header.hop_limit, attempt, self.identifier, sequence
        );

        if let Err(e) = self.transport.send(&self.send_buf[..len]) {
            error!("Send failed: {}\n{}", e, hex_dump(&self.send_buf[..len]));
            return Err(TraceError::transport("send", e));
        }

        Ok(ProbeState {
            identifier: self.identifier,
            sequence,
            hop_limit: header.hop_limit,
            attempt,
            len,
        })
    }

    /// Wait for a definitive response to `probe` within one timeout budget.
    ///
    /// Frames that do not match are consumed without resetting the budget.
    fn await_response(
        &mut self,
        probe: &ProbeState,
        local: &Ipv6Addr,
    ) -> Result<Classification, TraceError> {
        let mut remaining = self.config.timeout;

        while !remaining.is_zero() {
            let len = match self.transport.receive(&mut self.recv_buf, &mut remaining) {
                Ok(0) => break,
                Ok(len) => len,
                Err(e) => {
                    error!("Receive failed: {}\n{}", e, hex_dump(&self.recv_buf[..PROBE_SIZE]));
                    return Err(TraceError::transport("receive", e));
                }
            };

            let frame = &self.recv_buf[..len];
            if !addressed_to(frame, local) {
                continue;
            }

            let result = classify(&self.send_buf[..probe.len], frame);
            if result.is_match() {
                return Ok(result);
            }
        }

        debug!(
            "No response to seq {} at hop limit {} (attempt {})",
            probe.sequence, probe.hop_limit, probe.attempt
        );
        Ok(Classification::NoMatch)
    }
}
