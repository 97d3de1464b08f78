use std::net::Ipv6Addr;

/// ICMPv6 next-header value used in the pseudo-header
pub const IPPROTO_ICMPV6: u8 = 58;

/// Offset of the checksum field within an ICMPv6 message
pub const CHECKSUM_OFFSET: usize = 2;

/// Add 16-bit big-endian words of `data` to `sum`, padding an odd trailing byte with zero.
/// Bytes at `skip..skip + 2` are treated as zero when `skip` is given.
fn add_words(mut sum: u32, data: &[u8], skip: Option<usize>) -> u32 {
    let mut i = 0;
    while i + 1 < data.len() {
        if skip != Some(i) {
            sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        }
        i += 2;
    }
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }
    sum
}

/// Fold a 32-bit accumulator down to 16 bits (RFC 1071)
fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

fn pseudo_header_sum(src: &Ipv6Addr, dst: &Ipv6Addr, length: u32, next_header: u8) -> u32 {
    let mut sum = add_words(0, &src.octets(), None);
    sum = add_words(sum, &dst.octets(), None);
    sum += length >> 16;
    sum += length & 0xFFFF;
    sum + next_header as u32
}

fn checksum_skipping(src: &Ipv6Addr, dst: &Ipv6Addr, payload: &[u8], skip: Option<usize>) -> u16 {
    // Fold the pseudo-header early so a full-size payload cannot overflow the accumulator
    let sum = fold(pseudo_header_sum(src, dst, payload.len() as u32, IPPROTO_ICMPV6)) as u32;
    let cksum = !fold(add_words(sum, payload, skip));
    // A computed zero is transmitted as all ones (RFC 8200 section 8.1)
    if cksum == 0 { 0xFFFF } else { cksum }
}

/// Compute the ICMPv6 checksum over the IPv6 pseudo-header and `payload`.
///
/// The checksum field inside `payload` is summed as-is, so callers building
/// a message must leave it zeroed.
pub fn icmpv6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, payload: &[u8]) -> u16 {
    checksum_skipping(src, dst, payload, None)
}

/// Verify the checksum carried in an ICMPv6 message.
///
/// Recomputes the checksum as if the field were zero and compares it against
/// the transmitted value. The message itself is never modified.
pub fn verify_icmpv6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, message: &[u8]) -> bool {
    if message.len() < CHECKSUM_OFFSET + 2 {
        return false;
    }
    let carried = u16::from_be_bytes([message[CHECKSUM_OFFSET], message[CHECKSUM_OFFSET + 1]]);
    checksum_skipping(src, dst, message, Some(CHECKSUM_OFFSET)) == carried
}

/// Write the checksum of `message` into its checksum field (network byte order)
pub fn set_icmpv6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, message: &mut [u8]) {
    message[CHECKSUM_OFFSET] = 0;
    message[CHECKSUM_OFFSET + 1] = 0;
    let cksum = icmpv6_checksum(src, dst, message);
    message[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&cksum.to_be_bytes());
}
