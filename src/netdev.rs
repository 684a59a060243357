//! Network Device Abstraction
//!
//! The minimal frame-in/frame-out interface the upper layers need. It keeps
//! the smoltcp adapter in [`crate::stack`] independent of the controller so it
//! can be exercised with a loopback device.
//!
//! ## Example Usage
//!
//! ```ignore
//! use enc28j60::{Config, Enc28j60, MacAddress, NetworkDevice};
//!
//! let mac = MacAddress::new([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]);
//! let mut netdev = Enc28j60::new(spi, delay, Config::new(mac))?;
//!
//! let mut buf = [0u8; 1518];
//! let len = netdev.receive(&mut buf)?;
//! if len > 0 {
//!     // Process buf[..len]
//! }
//! ```

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::driver::{Enc28j60, MAX_TX_FRAME_LEN};
use crate::error::Error;
use crate::layout::MAX_FRAME_LENGTH;
use crate::mac::MacAddress;
use crate::monitor::Monitor;

/// Network device abstraction trait
///
/// # Design Decisions
///
/// - **Blocking transmit**: returns once the controller has sent the frame
/// - **Non-blocking receive**: returns 0 when no frame is waiting
/// - **Caller-owned buffers**: no allocation inside the driver
///
/// # Thread Safety
///
/// Implementations are not required to be thread-safe. Synchronization is up
/// to the caller (e.g. wrapping the device in `spin::Mutex`).
pub trait NetworkDevice {
    type Error: fmt::Debug;

    /// Transmit a complete Ethernet frame (header + payload, no CRC)
    #[must_use = "transmit() failure must be handled - frame may not have been sent"]
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Copy the next received frame into `buf`
    ///
    /// Returns the frame length, or 0 if nothing was available.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    fn mac_address(&self) -> MacAddress;

    /// Link state as last observed (returns false by default)
    fn link_up(&self) -> bool {
        false
    }

    /// Largest frame `receive` can produce
    fn max_frame_len(&self) -> usize {
        MAX_FRAME_LENGTH as usize
    }

    /// Largest frame `transmit` accepts
    ///
    /// May be smaller than [`max_frame_len`](Self::max_frame_len) when the
    /// device keeps per-frame metadata next to the frame.
    fn max_transmit_len(&self) -> usize {
        self.max_frame_len()
    }
}

impl<SPI, D, M> NetworkDevice for Enc28j60<SPI, D, M>
where
    SPI: SpiDevice,
    D: DelayNs,
    M: Monitor,
{
    type Error = Error<SPI::Error>;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        Enc28j60::transmit(self, frame)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Enc28j60::receive(self, buf)
    }

    fn mac_address(&self) -> MacAddress {
        Enc28j60::mac_address(self)
    }

    fn link_up(&self) -> bool {
        self.link_state().is_up()
    }

    /// 1509 bytes ([`MAX_TX_FRAME_LEN`])
    ///
    /// A control byte, one trailing byte and the 7-byte status vector share
    /// the fixed 1518-byte TX window with the frame. A full 1514-byte frame
    /// (1500-byte payload) is rejected, which puts the IP MTU at 1495.
    fn max_transmit_len(&self) -> usize {
        MAX_TX_FRAME_LEN
    }
}
