use crate::error::ParseError;
use crate::probe::packet::{IPV6_HEADER_SIZE, Ipv6Header};

// IPv6 extension headers that are skipped on the way to the transport payload
pub const IPV6_NH_HOP_BY_HOP: u8 = 0x00;
pub const IPV6_NH_ROUTING: u8 = 0x2b;
pub const IPV6_NH_DEST_OPTS: u8 = 0x3c;

/// Whether `next_header` names an extension header we know how to skip
pub fn is_skippable(next_header: u8) -> bool {
    matches!(
        next_header,
        IPV6_NH_HOP_BY_HOP | IPV6_NH_ROUTING | IPV6_NH_DEST_OPTS
    )
}

/// Location of the transport-layer payload inside a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportPayload {
    /// Offset from the start of the packet
    pub offset: usize,
    /// Protocol number of the payload found at `offset`
    pub next_header: u8,
    /// End of the IPv6 payload (bounded by the received length)
    pub end: usize,
}

/// Skip Hop-by-Hop, Routing and Destination Options headers to find the
/// transport payload.
///
/// Each extension header starts with its own next-header byte followed by a
/// length in 8-octet units, not counting the first 8 octets. The walk stops
/// at the first header type that is not skippable. It is bounded by the
/// declared payload length, itself clamped to the bytes actually received.
pub fn locate_transport_payload(packet: &[u8]) -> Result<TransportPayload, ParseError> {
    let header = Ipv6Header::parse(packet)?;
    let end = (IPV6_HEADER_SIZE + header.payload_length as usize).min(packet.len());

    let mut next_header = header.next_header;
    let mut offset = IPV6_HEADER_SIZE;

    while is_skippable(next_header) {
        if offset + 2 > end {
            return Err(ParseError::MalformedExtensionChain { offset });
        }
        let ext_len = 8 + 8 * packet[offset + 1] as usize;
        if offset + ext_len > end {
            return Err(ParseError::MalformedExtensionChain { offset });
        }
        next_header = packet[offset];
        offset += ext_len;
    }

    Ok(TransportPayload {
        offset,
        next_header,
        end,
    })
}
