//! Integration tests for the probe -> receive -> classify -> print pipeline
//!
//! A scripted transport stands in for the network: for every receive call it
//! plays the next scripted event, building response frames from the probe
//! that was just sent, so no actual network access is needed.

use std::collections::VecDeque;
use std::io;
use std::net::Ipv6Addr;
use std::time::Duration;

use trace6::config::Config;
use trace6::error::TraceError;
use trace6::probe::{HOP_LIMIT_OFFSET, IPV6_HEADER_SIZE, Transport, build_ipv6_header, set_icmpv6_checksum};
use trace6::state::{AttemptOutcome, TraceOutcome};
use trace6::trace::ProbeLoop;

const LOCAL: &str = "2001:db8:1::100";
const TARGET: &str = "2001:db8:9::1";

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

/// What the network does in response to one receive call
#[derive(Debug, Clone)]
enum Event {
    /// Budget runs out with nothing received
    Silence,
    /// Time Exceeded from a router quoting the last probe
    TimeExceeded(Ipv6Addr),
    /// Destination Unreachable quoting the last probe
    Unreachable(Ipv6Addr),
    /// Echo Reply to the last probe
    EchoReply(Ipv6Addr),
    /// Echo Reply with a stale sequence number
    StaleReply(Ipv6Addr),
    /// Valid-looking Time Exceeded with a corrupted checksum
    Corrupted(Ipv6Addr),
    /// Receive error
    Fail,
}

struct ScriptedTransport {
    local: Ipv6Addr,
    script: VecDeque<Event>,
    last_probe: Vec<u8>,
    sent: usize,
    /// (probes sent so far, budget handed in) for every receive call
    budgets: Vec<(usize, Duration)>,
}

impl ScriptedTransport {
    fn new(script: Vec<Event>) -> Self {
        Self {
            local: addr(LOCAL),
            script: script.into(),
            last_probe: Vec::new(),
            sent: 0,
            budgets: Vec::new(),
        }
    }

    fn wrap(&self, src: Ipv6Addr, mut message: Vec<u8>) -> Vec<u8> {
        set_icmpv6_checksum(&src, &self.local, &mut message);
        let mut header = build_ipv6_header(57, src, self.local);
        header.payload_length = message.len() as u16;
        let mut frame = vec![0u8; IPV6_HEADER_SIZE];
        header.write_to(&mut frame);
        frame.extend_from_slice(&message);
        frame
    }

    fn quoting_error(&self, icmp_type: u8, src: Ipv6Addr) -> Vec<u8> {
        let mut message = vec![icmp_type, 0, 0, 0, 0, 0, 0, 0];
        let mut quoted = self.last_probe.clone();
        quoted[HOP_LIMIT_OFFSET] = 1;
        message.extend_from_slice(&quoted);
        self.wrap(src, message)
    }

    fn echo_reply(&self, src: Ipv6Addr, seq_delta: u16) -> Vec<u8> {
        let request = &self.last_probe[IPV6_HEADER_SIZE..];
        let seq = u16::from_be_bytes([request[6], request[7]]).wrapping_add(seq_delta);
        let mut message = vec![129, 0, 0, 0, request[4], request[5]];
        message.extend_from_slice(&seq.to_be_bytes());
        self.wrap(src, message)
    }
}

impl Transport for ScriptedTransport {
    fn local_ipv6_address(&self) -> io::Result<Ipv6Addr> {
        Ok(self.local)
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.last_probe = frame.to_vec();
        self.sent += 1;
        Ok(frame.len())
    }

    fn receive(&mut self, buf: &mut [u8], remaining: &mut Duration) -> io::Result<usize> {
        self.budgets.push((self.sent, *remaining));
        let frame = match self.script.pop_front().unwrap_or(Event::Silence) {
            Event::Silence => {
                *remaining = Duration::ZERO;
                return Ok(0);
            }
            Event::Fail => return Err(io::Error::new(io::ErrorKind::NetworkDown, "link down")),
            Event::TimeExceeded(src) => self.quoting_error(3, src),
            Event::Unreachable(src) => self.quoting_error(1, src),
            Event::EchoReply(src) => self.echo_reply(src, 0),
            Event::StaleReply(src) => self.echo_reply(src, 1),
            Event::Corrupted(src) => {
                let mut frame = self.quoting_error(3, src);
                frame[IPV6_HEADER_SIZE + 2] ^= 0x55;
                frame
            }
        };
        *remaining = remaining.saturating_sub(Duration::from_millis(10));
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }
}

fn config(attempts: u8, max_hop_limit: u8) -> Config {
    Config {
        timeout: Duration::from_secs(1),
        attempts,
        max_hop_limit,
        ..Config::default()
    }
}

fn run(config: Config, script: Vec<Event>) -> (Result<trace6::state::TraceSummary, TraceError>, String, usize) {
    let mut out = Vec::new();
    let mut engine = ProbeLoop::new(config, ScriptedTransport::new(script), &mut out);
    let result = engine.run(TARGET);
    let sent = engine.transport().sent;
    drop(engine);
    (result, String::from_utf8(out).unwrap(), sent)
}

#[test]
fn test_reaches_target_in_three_hops() {
    let r1 = addr("2001:db8:2::1");
    let r2 = addr("2001:db8:3::1");
    let target = addr(TARGET);
    let script = vec![
        Event::TimeExceeded(r1),
        Event::TimeExceeded(r1),
        Event::TimeExceeded(r1),
        Event::TimeExceeded(r2),
        Event::TimeExceeded(r2),
        Event::TimeExceeded(r2),
        Event::EchoReply(target),
    ];

    let (result, output, sent) = run(config(3, 30), script);
    let summary = result.unwrap();

    assert_eq!(
        output,
        format!("1  {r1}  {r1}  {r1}\n2  {r2}  {r2}  {r2}\n3  {target}\n")
    );
    assert_eq!(summary.outcome, TraceOutcome::Reached);
    assert_eq!(summary.hops.len(), 3);
    assert_eq!(summary.last_hop(), Some(3));
    assert!(summary.hops[2].reached());
    // Remaining attempts at the reached hop are skipped
    assert_eq!(sent, 7);
}

#[test]
fn test_silent_first_hop() {
    let r2 = addr("2001:db8:3::1");
    let script = vec![
        Event::Silence,
        Event::Silence,
        Event::Silence,
        Event::TimeExceeded(r2),
        Event::TimeExceeded(r2),
        Event::TimeExceeded(r2),
    ];

    let (result, output, _) = run(config(3, 2), script);
    let summary = result.unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "1  *  *  *");
    assert_eq!(lines[1], format!("2  {r2}  {r2}  {r2}"));
    assert_eq!(summary.outcome, TraceOutcome::HopLimitExhausted);
    assert_eq!(
        summary.hops[0].attempts,
        vec![AttemptOutcome::NoReply; 3]
    );
}

#[test]
fn test_unreachable_stops_trace() {
    let r1 = addr("2001:db8:2::1");
    let r2 = addr("2001:db8:3::1");
    let script = vec![
        Event::TimeExceeded(r1),
        Event::TimeExceeded(r1),
        Event::TimeExceeded(r1),
        Event::Unreachable(r2),
    ];

    let (result, output, sent) = run(config(3, 30), script);
    let summary = result.unwrap();

    assert_eq!(output, format!("1  {r1}  {r1}  {r1}\n2  {r2}!X\n"));
    assert_eq!(summary.outcome, TraceOutcome::Unreachable);
    assert_eq!(summary.hops.len(), 2);
    assert!(summary.hops[1].unreachable());
    assert_eq!(sent, 4);
}

#[test]
fn test_noise_does_not_reset_attempt() {
    // Stale and corrupted frames are consumed while waiting for the real reply
    let target = addr(TARGET);
    let script = vec![
        Event::StaleReply(target),
        Event::Corrupted(addr("2001:db8:2::1")),
        Event::EchoReply(addr("2001:db8:dead::1")),
        Event::EchoReply(target),
    ];

    let (result, output, sent) = run(config(3, 30), script);
    let summary = result.unwrap();

    assert_eq!(output, format!("1  {target}\n"));
    assert_eq!(summary.outcome, TraceOutcome::Reached);
    assert_eq!(sent, 1);
}

#[test]
fn test_noise_spends_the_same_budget() {
    let target = addr(TARGET);
    let router = addr("2001:db8:2::1");
    let script = vec![
        // First attempt: three rejected frames, then the budget runs out
        Event::StaleReply(target),
        Event::Corrupted(router),
        Event::EchoReply(addr("2001:db8:dead::1")),
        Event::Silence,
        // Second attempt: one rejected frame, then the reply
        Event::StaleReply(target),
        Event::EchoReply(target),
    ];

    let mut out = Vec::new();
    let mut engine = ProbeLoop::new(config(3, 1), ScriptedTransport::new(script), &mut out);
    let summary = engine.run(TARGET).unwrap();
    assert_eq!(summary.outcome, TraceOutcome::Reached);

    let timeout = Duration::from_secs(1);
    let budgets = engine.transport().budgets.clone();
    drop(engine);
    assert_eq!(String::from_utf8(out).unwrap(), format!("1  *  {target}\n"));

    let attempt = |n: usize| -> Vec<Duration> {
        budgets.iter().filter(|b| b.0 == n).map(|b| b.1).collect()
    };

    let first = attempt(1);
    assert_eq!(first.len(), 4);
    assert_eq!(first[0], timeout);
    assert!(first.windows(2).all(|w| w[1] < w[0]));

    let second = attempt(2);
    assert_eq!(second.len(), 2);
    assert_eq!(second[0], timeout);
    assert!(second[1] < second[0]);
}

#[test]
fn test_timeout_then_reply_within_hop() {
    let r1 = addr("2001:db8:2::1");
    let script = vec![Event::Silence, Event::TimeExceeded(r1), Event::Silence];

    let (result, output, _) = run(config(3, 1), script);
    let summary = result.unwrap();

    assert_eq!(output, format!("1  *  {r1}  *\n"));
    assert_eq!(
        summary.hops[0].attempts,
        vec![
            AttemptOutcome::NoReply,
            AttemptOutcome::Hop(r1),
            AttemptOutcome::NoReply
        ]
    );
}

#[test]
fn test_receive_error_is_fatal() {
    let r1 = addr("2001:db8:2::1");
    let script = vec![Event::TimeExceeded(r1), Event::Fail];

    let (result, output, sent) = run(config(3, 30), script);

    assert!(matches!(
        result,
        Err(TraceError::Transport { op: "receive", .. })
    ));
    assert_eq!(output, format!("1  {r1}"));
    assert_eq!(sent, 2);
}

#[test]
fn test_invalid_target_sends_nothing() {
    let mut out = Vec::new();
    let mut engine = ProbeLoop::new(config(3, 30), ScriptedTransport::new(vec![]), &mut out);
    let result = engine.run("2001:db8::zz");
    assert!(matches!(result, Err(TraceError::InvalidTarget(_))));
    assert_eq!(engine.transport().sent, 0);
}
