//! Driver configuration
//!
//! Buffer layout is fixed at compile time (see [`crate::layout`]). What can be
//! chosen at runtime is the MAC address, the receive filter and how long each
//! polling loop may spin before the driver gives up.

use crate::mac::MacAddress;
use crate::poll::Retry;

/// Runtime settings for [`crate::Enc28j60`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub mac: MacAddress,

    /// Reset + EREVID probe; the chip may need a while after power-on
    pub revision_probe: Retry,

    /// Waiting for link up before construction completes
    pub link_wait: Retry,

    /// MISTAT.BUSY after a PHY read or write
    pub mii_wait: Retry,

    /// ECON1.TXRTS and the transmit status vector done bit
    pub transmit_wait: Retry,

    /// Pause after clearing a latched transmit error (DS80349C issue 12)
    pub tx_error_recovery_delay_ms: u32,

    /// Also accept broadcast ARP frames through the pattern match filter
    pub pattern_filter: bool,
}

impl Config {
    pub const fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            revision_probe: Retry::limited(10, 1_000_000),
            link_wait: Retry::limited(3000, 10_000),
            mii_wait: Retry::limited(1000, 11),
            transmit_wait: Retry::limited(100_000, 0),
            tx_error_recovery_delay_ms: 20,
            pattern_filter: true,
        }
    }

    /// Wait forever in every polling loop
    pub const fn unbounded(mut self) -> Self {
        self.revision_probe = Retry::forever(1_000_000);
        self.link_wait = Retry::forever(10_000);
        self.mii_wait = Retry::forever(11);
        self.transmit_wait = Retry::forever(0);
        self
    }
}
