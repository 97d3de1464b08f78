//! Raw transport for IPv6 packets.
//!
//! Probes go out through a raw IPv6 socket that carries our own IPv6 header,
//! so the kernel routes them and resolves the next-hop link address.
//! Responses are read from a pnet datalink channel opened in layer-3 mode
//! for EtherType 0x86DD, which delivers whole IPv6 packets without a link
//! header.

use pnet::datalink::{self, Channel, ChannelType, DataLinkReceiver, NetworkInterface};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddrV6};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::probe::packet::IPV6_HEADER_SIZE;

/// EtherType for IPv6
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

/// IPPROTO_RAW; on an IPv6 raw socket it implies the header is included
const IPPROTO_RAW: i32 = 255;

/// How often the datalink receiver wakes up to check the remaining budget
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Capabilities the probe loop needs from the network.
///
/// Closing the handle is tied to `Drop`.
pub trait Transport {
    /// Address of the sending interface, used as probe source
    fn local_ipv6_address(&self) -> io::Result<Ipv6Addr>;

    /// Send one IPv6 packet; returns the number of bytes written
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// Wait up to `remaining` for one frame and copy it into `buf`.
    ///
    /// Returns the frame length, or 0 once the budget is spent. On return
    /// `remaining` holds the unspent part of the budget. Implementations
    /// that poll may overrun the budget by up to one poll interval.
    fn receive(&mut self, buf: &mut [u8], remaining: &mut Duration) -> io::Result<usize>;
}

/// Check if an IPv6 address is link-local (fe80::/10)
pub fn is_link_local_ipv6(addr: &Ipv6Addr) -> bool {
    let first_seg = addr.segments()[0];
    (0xfe80..=0xfebf).contains(&first_seg)
}

/// Pick the probe source address from an interface's addresses.
///
/// Prefers the first non-loopback global address; falls back to a
/// link-local one when that is all the interface has.
pub fn select_source_address(addrs: &[IpAddr]) -> Option<Ipv6Addr> {
    let v6: Vec<Ipv6Addr> = addrs
        .iter()
        .filter_map(|a| match a {
            IpAddr::V6(v6) if !v6.is_loopback() && !v6.is_unspecified() => Some(*v6),
            _ => None,
        })
        .collect();

    v6.iter()
        .find(|a| !is_link_local_ipv6(a))
        .or_else(|| v6.first())
        .copied()
}

/// Socket address a probe is sent to: the destination field of its header.
///
/// The port must stay 0 on a header-included raw socket. Link-local
/// destinations are scoped to `if_index`.
pub fn probe_destination(frame: &[u8], if_index: u32) -> io::Result<SockAddr> {
    if frame.len() < IPV6_HEADER_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes has no IPv6 header", frame.len()),
        ));
    }
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&frame[24..40]);
    let dst = Ipv6Addr::from(octets);
    let scope_id = if is_link_local_ipv6(&dst) { if_index } else { 0 };
    Ok(SockAddr::from(SocketAddrV6::new(dst, 0, 0, scope_id)))
}

/// Budget left before `deadline`. A deadline too far out to represent as an
/// `Instant` never expires, so the original budget is kept.
fn time_left(deadline: Option<Instant>, budget: Duration) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        None => budget,
    }
}

/// Raw socket sender plus datalink receiver, bound to a single interface
pub struct DatalinkTransport {
    interface: NetworkInterface,
    tx: Socket,
    rx: Box<dyn DataLinkReceiver>,
}

impl DatalinkTransport {
    /// Open the raw send socket and a layer-3 IPv6 receive channel on the
    /// named interface
    pub fn open(interface_name: &str) -> io::Result<Self> {
        let interfaces = datalink::interfaces();
        let Some(interface) = interfaces.iter().find(|i| i.name == interface_name).cloned() else {
            let available: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "interface '{}' not found. Available interfaces: {}",
                    interface_name,
                    if available.is_empty() {
                        "(none)".to_string()
                    } else {
                        available.join(", ")
                    }
                ),
            ));
        };

        let config = datalink::Config {
            read_timeout: Some(POLL_INTERVAL),
            channel_type: ChannelType::Layer3(ETHERTYPE_IPV6),
            ..Default::default()
        };

        let rx = match datalink::channel(&interface, config)? {
            Channel::Ethernet(_, rx) => rx,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unsupported datalink channel type",
                ));
            }
        };

        let tx = Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::from(IPPROTO_RAW)))?;
        #[cfg(any(target_os = "linux", target_os = "android"))]
        tx.bind_device(Some(interface.name.as_bytes())).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to bind send socket to '{}': {}", interface.name, e),
            )
        })?;

        Ok(Self { interface, tx, rx })
    }

    pub fn interface_name(&self) -> &str {
        &self.interface.name
    }
}

impl Transport for DatalinkTransport {
    fn local_ipv6_address(&self) -> io::Result<Ipv6Addr> {
        let addrs: Vec<IpAddr> = self.interface.ips.iter().map(|n| n.ip()).collect();
        let addr = select_source_address(&addrs).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("interface '{}' has no IPv6 address", self.interface.name),
            )
        })?;
        if is_link_local_ipv6(&addr) {
            warn!(
                "Interface '{}' has only link-local IPv6 addresses, probing from {}",
                self.interface.name, addr
            );
        }
        Ok(addr)
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        let dst = probe_destination(frame, self.interface.index)?;
        self.tx.send_to(frame, &dst)
    }

    fn receive(&mut self, buf: &mut [u8], remaining: &mut Duration) -> io::Result<usize> {
        let budget = *remaining;
        let deadline = Instant::now().checked_add(budget);

        loop {
            match self.rx.next() {
                Ok(frame) => {
                    let len = frame.len().min(buf.len());
                    buf[..len].copy_from_slice(&frame[..len]);
                    *remaining = time_left(deadline, budget);
                    return Ok(len);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    *remaining = time_left(deadline, budget);
                    if remaining.is_zero() {
                        return Ok(0);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
