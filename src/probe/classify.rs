//! Match received frames against the probe that is currently outstanding.

use std::net::Ipv6Addr;
use tracing::debug;

use crate::error::ParseError;
use crate::probe::checksum::{IPPROTO_ICMPV6, verify_icmpv6_checksum};
use crate::probe::exthdr::locate_transport_payload;
use crate::probe::packet::{
    ECHO_HEADER_SIZE, HOP_LIMIT_OFFSET, ICMPV6_DEST_UNREACHABLE, ICMPV6_ECHO_REPLY,
    ICMPV6_TIME_EXCEEDED, IPV6_HEADER_SIZE, Ipv6Header,
};

/// Maximum number of bytes of the original payload compared in a quoted packet
pub const MAX_QUOTED_PAYLOAD: usize = 48;

/// Outcome of matching one received frame against the sent probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not a response to this probe; keep waiting
    NoMatch,
    /// Destination Unreachable quoting our probe
    Unreachable(Ipv6Addr),
    /// Hop limit exceeded in transit, quoting our probe
    TimeExceeded(Ipv6Addr),
    /// Echo Reply from the target itself
    EchoReply(Ipv6Addr),
}

impl Classification {
    /// Address of the node that answered, if the frame matched
    pub fn responder(&self) -> Option<Ipv6Addr> {
        match self {
            Self::NoMatch => None,
            Self::Unreachable(addr) | Self::TimeExceeded(addr) | Self::EchoReply(addr) => {
                Some(*addr)
            }
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Classify `received` against the probe bytes in `sent`.
///
/// `sent` is the assembled probe: IPv6 header followed by the echo request.
/// This is a pure function; neither slice is modified.
pub fn classify(sent: &[u8], received: &[u8]) -> Classification {
    match try_classify(sent, received) {
        Ok(result) => result,
        Err(e) => {
            debug!("Frame dropped: {}", e);
            Classification::NoMatch
        }
    }
}

fn try_classify(sent: &[u8], received: &[u8]) -> Result<Classification, ParseError> {
    let sent_header = Ipv6Header::parse(sent)?;
    let header = Ipv6Header::parse(received)?;

    if header.version != 6 {
        debug!("Frame dropped: IP version {}", header.version);
        return Ok(Classification::NoMatch);
    }

    let payload = locate_transport_payload(received)?;
    if payload.next_header != IPPROTO_ICMPV6 {
        debug!(
            "Frame dropped: next header {} is not ICMPv6",
            payload.next_header
        );
        return Ok(Classification::NoMatch);
    }

    let message = &received[payload.offset..payload.end];
    if message.len() < ECHO_HEADER_SIZE {
        return Err(ParseError::Truncated {
            needed: ECHO_HEADER_SIZE,
            available: message.len(),
        });
    }

    if !verify_icmpv6_checksum(&header.source, &header.destination, message) {
        debug!("Frame dropped: bad ICMPv6 checksum from {}", header.source);
        return Ok(Classification::NoMatch);
    }

    let icmp_type = message[0];
    let icmp_code = message[1];
    let responder = header.source;

    if icmp_type == ICMPV6_DEST_UNREACHABLE && quotes_probe(sent, message) {
        return Ok(Classification::Unreachable(responder));
    }

    if icmp_type == ICMPV6_TIME_EXCEEDED && icmp_code == 0 && quotes_probe(sent, message) {
        return Ok(Classification::TimeExceeded(responder));
    }

    if icmp_type == ICMPV6_ECHO_REPLY
        && icmp_code == 0
        && echo_words_match(sent, message)
        && sent_header.destination == responder
    {
        return Ok(Classification::EchoReply(responder));
    }

    Ok(Classification::NoMatch)
}

/// Copy of the first `len` bytes of a packet with the hop limit forced to 1.
///
/// Routers decrement the hop limit before quoting, so this byte is the only
/// one allowed to differ between the probe and its quoted copy.
fn normalized(packet: &[u8], len: usize) -> Vec<u8> {
    let mut copy = packet[..len].to_vec();
    copy[HOP_LIMIT_OFFSET] = 1;
    copy
}

/// Whether an ICMPv6 error message quotes the sent probe.
///
/// Compares the IPv6 header plus up to [`MAX_QUOTED_PAYLOAD`] bytes of the
/// original payload, ignoring only the hop limit.
fn quotes_probe(sent: &[u8], message: &[u8]) -> bool {
    let len = sent.len().min(IPV6_HEADER_SIZE + MAX_QUOTED_PAYLOAD);
    let quoted = &message[ECHO_HEADER_SIZE..];
    if quoted.len() < len {
        return false;
    }
    normalized(sent, len) == normalized(quoted, len)
}

/// Whether identifier and sequence of a reply equal those of the request
fn echo_words_match(sent: &[u8], message: &[u8]) -> bool {
    let Some(request) = sent.get(IPV6_HEADER_SIZE..IPV6_HEADER_SIZE + ECHO_HEADER_SIZE) else {
        return false;
    };
    request[4..8] == message[4..8]
}
