//! IPv6 header and ICMPv6 echo message wire formats.
//!
//! Fields are assembled and extracted with explicit shifts and masks in
//! network byte order; nothing here depends on host layout.

use std::net::Ipv6Addr;

use crate::error::ParseError;
use crate::probe::checksum::{IPPROTO_ICMPV6, set_icmpv6_checksum};

/// Fixed IPv6 header size
pub const IPV6_HEADER_SIZE: usize = 40;
/// ICMPv6 echo header size (no data)
pub const ECHO_HEADER_SIZE: usize = 8;
/// Size of an assembled probe: IPv6 header followed by an echo request
pub const PROBE_SIZE: usize = IPV6_HEADER_SIZE + ECHO_HEADER_SIZE;

// ICMPv6 type codes
pub const ICMPV6_DEST_UNREACHABLE: u8 = 1;
pub const ICMPV6_TIME_EXCEEDED: u8 = 3;
pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

/// Byte offset of the hop limit within the IPv6 header
pub const HOP_LIMIT_OFFSET: usize = 7;

/// Fixed IPv6 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    /// 20-bit flow label
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

impl Ipv6Header {
    /// Parse the fixed header from the start of `data`.
    ///
    /// Only the length is checked; the version is left to the caller.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < IPV6_HEADER_SIZE {
            return Err(ParseError::Truncated {
                needed: IPV6_HEADER_SIZE,
                available: data.len(),
            });
        }

        let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let mut source = [0u8; 16];
        let mut destination = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        destination.copy_from_slice(&data[24..40]);

        Ok(Self {
            version: (word >> 28) as u8,
            traffic_class: ((word >> 20) & 0xFF) as u8,
            flow_label: word & 0x000F_FFFF,
            payload_length: u16::from_be_bytes([data[4], data[5]]),
            next_header: data[6],
            hop_limit: data[HOP_LIMIT_OFFSET],
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
        })
    }

    /// Serialize into the first 40 bytes of `buf`
    pub fn write_to(&self, buf: &mut [u8]) {
        let word = ((self.version as u32 & 0x0F) << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & 0x000F_FFFF);
        buf[0..4].copy_from_slice(&word.to_be_bytes());
        buf[4..6].copy_from_slice(&self.payload_length.to_be_bytes());
        buf[6] = self.next_header;
        buf[HOP_LIMIT_OFFSET] = self.hop_limit;
        buf[8..24].copy_from_slice(&self.source.octets());
        buf[24..40].copy_from_slice(&self.destination.octets());
    }
}

/// ICMPv6 echo request/reply header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoMessage {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl EchoMessage {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ECHO_HEADER_SIZE {
            return Err(ParseError::Truncated {
                needed: ECHO_HEADER_SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            identifier: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// Serialize into the first 8 bytes of `buf`
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.icmp_type;
        buf[1] = self.code;
        buf[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        buf[6..8].copy_from_slice(&self.sequence.to_be_bytes());
    }
}

/// Build the IPv6 header for a probe sent with `hop_limit`
pub fn build_ipv6_header(hop_limit: u8, src: Ipv6Addr, dst: Ipv6Addr) -> Ipv6Header {
    Ipv6Header {
        version: 6,
        traffic_class: 0,
        flow_label: 0,
        payload_length: ECHO_HEADER_SIZE as u16,
        next_header: IPPROTO_ICMPV6,
        hop_limit,
        source: src,
        destination: dst,
    }
}

/// Build an echo request with the checksum left at zero
pub fn build_echo_request(identifier: u16, sequence: u16) -> EchoMessage {
    EchoMessage {
        icmp_type: ICMPV6_ECHO_REQUEST,
        code: 0,
        checksum: 0,
        identifier,
        sequence,
    }
}

/// Serialize `header` and `echo` into `buf`, then patch in the checksum.
///
/// Returns the number of bytes written ([`PROBE_SIZE`]).
pub fn assemble_probe(buf: &mut [u8], header: &Ipv6Header, echo: &EchoMessage) -> usize {
    let packet = &mut buf[..PROBE_SIZE];
    header.write_to(packet);
    echo.write_to(&mut packet[IPV6_HEADER_SIZE..]);
    set_icmpv6_checksum(
        &header.source,
        &header.destination,
        &mut packet[IPV6_HEADER_SIZE..],
    );
    PROBE_SIZE
}
