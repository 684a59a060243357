//! Receive filter setup
//!
//! Frames are accepted when they are unicast to our address with a valid CRC,
//! or (optionally) when the pattern match filter recognises a broadcast ARP
//! frame. The pattern filter compares an IP-style ones' complement checksum
//! over the bytes selected by EPMM against EPMCS.

use embedded_hal::spi::SpiDevice;
use smoltcp::wire::EthernetProtocol;

use crate::bus::Bus;
use crate::error::Error;
use crate::monitor::Monitor;
use crate::regs::{self, ERXFCON_CRCEN, ERXFCON_PMEN, ERXFCON_UCEN};

/// EPMM0/EPMM1: frame bytes 0-5 (destination) and 12-13 (EtherType)
pub const PATTERN_MASK: [u8; 2] = [0x3F, 0x30];

/// Canonical frame the pattern checksum is computed over
///
/// Broadcast destination, placeholder source (masked out), ARP EtherType.
pub fn pattern_template() -> [u8; 14] {
    let [type_high, type_low] = u16::from(EthernetProtocol::Arp).to_be_bytes();
    [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // destination
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // source
        type_high, type_low,
    ]
}

/// RFC 1071 checksum over the bytes of `frame` selected by `mask`
///
/// Selected bytes are packed together in order before summing, which is how
/// the pattern match hardware forms its 16-bit words.
pub fn pattern_checksum(frame: &[u8], mask: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut high: Option<u8> = None;

    let selected = frame
        .iter()
        .enumerate()
        .filter(|(i, _)| mask.get(i / 8).is_some_and(|m| m & (1 << (i % 8)) != 0))
        .map(|(_, b)| *b);

    for byte in selected {
        match high.take() {
            Some(h) => sum += u16::from_be_bytes([h, byte]) as u32,
            None => high = Some(byte),
        }
    }
    if let Some(h) = high {
        sum += u16::from_be_bytes([h, 0]) as u32;
    }

    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Program ERXFCON and, when enabled, the pattern match registers
pub fn configure<SPI, M>(bus: &mut Bus<SPI, M>, pattern: bool) -> Result<(), Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
{
    if !pattern {
        return bus.write_reg(regs::ERXFCON, ERXFCON_UCEN | ERXFCON_CRCEN);
    }

    let checksum = pattern_checksum(&pattern_template(), &PATTERN_MASK);
    let [cs_high, cs_low] = checksum.to_be_bytes();

    bus.write_reg(regs::ERXFCON, ERXFCON_UCEN | ERXFCON_CRCEN | ERXFCON_PMEN)?;
    bus.write_reg(regs::EPMM0, PATTERN_MASK[0])?;
    bus.write_reg(regs::EPMM1, PATTERN_MASK[1])?;
    bus.write_reg(regs::EPMCSL, cs_low)?;
    bus.write_reg(regs::EPMCSH, cs_high)
}
