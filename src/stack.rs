//! smoltcp integration
//!
//! [`SmoltcpDevice`] exposes any [`NetworkDevice`] behind a `spin::Mutex` as a
//! `smoltcp::phy::Device`. Each token takes the lock for exactly one driver
//! call, so a frame's register sequence is never interleaved with another
//! caller's.
//!
//! Frames are staged in two fixed buffers owned by the adapter; nothing is
//! allocated per packet.

use smoltcp::phy::{self, DeviceCapabilities, Medium};
use smoltcp::time::Instant;
use spin::Mutex;

use crate::layout::MAX_FRAME_LENGTH;
use crate::netdev::NetworkDevice;

const FRAME_BUF_LEN: usize = MAX_FRAME_LENGTH as usize;

/// Ethernet header length; smoltcp's MTU for Ethernet media includes it
const ETHERNET_HEADER_LEN: usize = 14;

/// CRC the MAC appends on transmit (MACON3.TXCRCEN)
const CRC_LEN: usize = 4;

/// `phy::Device` adapter over a shared network device
pub struct SmoltcpDevice<'a, N> {
    device: &'a Mutex<N>,
    rx_buf: [u8; FRAME_BUF_LEN],
    tx_buf: [u8; FRAME_BUF_LEN],
}

impl<'a, N: NetworkDevice> SmoltcpDevice<'a, N> {
    pub fn new(device: &'a Mutex<N>) -> Self {
        Self {
            device,
            rx_buf: [0; FRAME_BUF_LEN],
            tx_buf: [0; FRAME_BUF_LEN],
        }
    }

    pub fn device(&self) -> &'a Mutex<N> {
        self.device
    }
}

impl<'a, N: NetworkDevice> phy::Device for SmoltcpDevice<'a, N> {
    type RxToken<'b>
        = RxToken<'b>
    where
        Self: 'b;
    type TxToken<'b>
        = TxToken<'b, N>
    where
        Self: 'b;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let len = match self.device.lock().receive(&mut self.rx_buf) {
            Ok(0) => return None,
            Ok(len) => len,
            Err(e) => {
                log::warn!("[ENC28J60] Receive failed: {:?}", e);
                return None;
            }
        };

        Some((
            RxToken {
                frame: &mut self.rx_buf[..len],
            },
            TxToken {
                device: self.device,
                buf: &mut self.tx_buf,
            },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        Some(TxToken {
            device: self.device,
            buf: &mut self.tx_buf,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let max_transmit = self.device.lock().max_transmit_len();

        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        // Received frames still carry the CRC, transmitted ones get it added
        caps.max_transmission_unit = max_transmit.min(FRAME_BUF_LEN - CRC_LEN);
        caps.max_burst_size = Some(1);
        caps
    }
}

/// A received frame, borrowed from the adapter's RX buffer
pub struct RxToken<'a> {
    frame: &'a mut [u8],
}

impl phy::RxToken for RxToken<'_> {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(self.frame)
    }
}

/// Permission to send one frame; the frame goes out when consumed
pub struct TxToken<'a, N> {
    device: &'a Mutex<N>,
    buf: &'a mut [u8; FRAME_BUF_LEN],
}

impl<N: NetworkDevice> phy::TxToken for TxToken<'_, N> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let len = len.min(FRAME_BUF_LEN);
        let frame = &mut self.buf[..len];
        let result = f(frame);

        if len < ETHERNET_HEADER_LEN {
            log::warn!("[ENC28J60] Dropping {}-byte frame shorter than a header", len);
        } else if let Err(e) = self.device.lock().transmit(frame) {
            log::warn!("[ENC28J60] Transmit failed: {:?}", e);
        }
        result
    }
}
