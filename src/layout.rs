//! On-chip buffer partitioning
//!
//! The 8 KiB packet buffer is split into a receive ring at the bottom and a
//! transmit window at the top, sized for exactly one maximum-length frame:
//!
//! ```text
//! 0x0000                 RX_END  TX_START            0x1FFF
//!   |<------ RX ring ------->|    |<-- TX window -->|
//! ```
//!
//! RX_START is 0 so that the errata workaround for ERXST (it must stay at
//! zero, see DS80349C issue 5) is satisfied without extra code.

use embedded_hal::spi::SpiDevice;

use crate::bus::Bus;
use crate::error::Error;
use crate::monitor::Monitor;
use crate::regs;

pub const BUFFER_SIZE: u16 = 8192;

/// Largest Ethernet frame the MAC accepts, including the CRC
pub const MAX_FRAME_LENGTH: u16 = 1518;

pub const TX_END: u16 = BUFFER_SIZE - 1;
pub const TX_START: u16 = TX_END - MAX_FRAME_LENGTH + 1;
pub const RX_START: u16 = 0;
pub const RX_END: u16 = TX_START - 1;

/// Bytes in the receive ring
pub const RX_SIZE: u16 = RX_END - RX_START + 1;

// ERXRDPT has to be odd; fix_read_pointer relies on the ring ending on one.
const _: () = assert!(RX_END % 2 == 1);
const _: () = assert!(RX_START % 2 == 0);

/// ERXRDPT value for a ring position
///
/// The chip needs ERXRDPT one below the next unread byte, which is always odd
/// (DS80349C issue 14). At the bottom of the ring the pointer clamps to
/// RX_END instead of wrapping below zero.
#[inline]
pub const fn fix_read_pointer(ptr: u16) -> u16 {
    let candidate = ptr.wrapping_sub(1);
    if candidate > RX_END { RX_END } else { candidate }
}

/// Advance a ring position by `offset` bytes with wrap-around
#[inline]
pub const fn wrap_rx_pointer(ptr: u16, offset: u16) -> u16 {
    let next = ptr as u32 + offset as u32;
    if next > RX_END as u32 {
        (next - RX_SIZE as u32) as u16
    } else {
        next as u16
    }
}

/// Program the receive ring and return the initial ring cursor
pub fn configure_receive_window<SPI, M>(bus: &mut Bus<SPI, M>) -> Result<u16, Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
{
    bus.write_reg_pair(regs::ERXSTL, regs::ERXSTH, RX_START)?;
    bus.write_reg_pair(regs::ERXRDPTL, regs::ERXRDPTH, fix_read_pointer(RX_START))?;
    bus.write_reg_pair(regs::ERXNDL, regs::ERXNDH, RX_END)?;
    Ok(RX_START)
}

/// Program the transmit window
pub fn configure_transmit_window<SPI, M>(bus: &mut Bus<SPI, M>) -> Result<(), Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
{
    bus.write_reg_pair(regs::ETXSTL, regs::ETXSTH, TX_START)?;
    bus.write_reg_pair(regs::ETXNDL, regs::ETXNDH, TX_END)
}

/// Program both windows, returns the receive ring cursor
pub fn configure_all<SPI, M>(bus: &mut Bus<SPI, M>) -> Result<u16, Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
{
    let cursor = configure_receive_window(bus)?;
    configure_transmit_window(bus)?;
    Ok(cursor)
}
