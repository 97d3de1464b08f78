pub mod checksum;
pub mod classify;
pub mod exthdr;
pub mod hexdump;
pub mod packet;
pub mod transport;

pub use checksum::*;
pub use classify::*;
pub use exthdr::*;
pub use hexdump::*;
pub use packet::*;
pub use transport::*;
