//! PHY access over the MII management interface
//!
//! PHY registers are not on the SPI register map. They are reached through
//! MIREGADR/MICMD/MIRD/MIWR, with MISTAT.BUSY showing when the MII
//! transaction is finished (DS39662E section 3.3).

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::bus::Bus;
use crate::error::{Error, Wait};
use crate::monitor::Monitor;
use crate::poll::{Retry, poll};
use crate::regs::{self, EIR_DMAIF, EIR_LINKIF, MICMD_MIIRD, MISTAT_BUSY, PHSTAT2_LSTAT};

/// MII transactions take 10.24 us
const MII_SETTLE_US: u32 = 11;

/// Physical link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Down,
    Up,
}

impl LinkState {
    pub fn is_up(self) -> bool {
        self == LinkState::Up
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Down => write!(f, "down"),
            LinkState::Up => write!(f, "up"),
        }
    }
}

fn wait_mii_idle<SPI, M, D>(
    bus: &mut Bus<SPI, M>,
    delay: &mut D,
    retry: Retry,
) -> Result<(), Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
    D: DelayNs,
{
    poll(delay, retry, Wait::MiiBusy, |_| {
        let status = bus.read_reg(regs::MISTAT)?;
        Ok((status & MISTAT_BUSY == 0).then_some(()))
    })
}

/// Read a PHY register
pub fn read<SPI, M, D>(
    bus: &mut Bus<SPI, M>,
    delay: &mut D,
    retry: Retry,
    reg: u8,
) -> Result<u16, Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
    D: DelayNs,
{
    bus.write_reg(regs::MIREGADR, reg)?;
    bus.set_bits(regs::MICMD, MICMD_MIIRD)?;

    wait_mii_idle(bus, delay, retry)?;

    bus.clear_bits(regs::MICMD, MICMD_MIIRD)?;

    let high = bus.read_reg(regs::MIRDH)?;
    let low = bus.read_reg(regs::MIRDL)?;
    Ok(u16::from_be_bytes([high, low]))
}

/// Write a PHY register
///
/// Writing MIWRH starts the MII transaction, so the low byte goes first.
pub fn write<SPI, M, D>(
    bus: &mut Bus<SPI, M>,
    delay: &mut D,
    retry: Retry,
    reg: u8,
    value: u16,
) -> Result<(), Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
    D: DelayNs,
{
    let [low, high] = value.to_le_bytes();
    bus.write_reg(regs::MIREGADR, reg)?;
    bus.write_reg(regs::MIWRL, low)?;
    bus.write_reg(regs::MIWRH, high)?;

    delay.delay_us(MII_SETTLE_US);
    wait_mii_idle(bus, delay, retry)
}

/// Link-up/link-down tracking
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkMonitor {
    state: LinkState,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed state, without touching the chip
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Read PHSTAT2.LSTAT and record the result
    pub fn update<SPI, M, D>(
        &mut self,
        bus: &mut Bus<SPI, M>,
        delay: &mut D,
        retry: Retry,
    ) -> Result<LinkState, Error<SPI::Error>>
    where
        SPI: SpiDevice,
        M: Monitor,
        D: DelayNs,
    {
        let phstat2 = read(bus, delay, retry, regs::PHSTAT2)?;
        let state = if phstat2 & PHSTAT2_LSTAT != 0 {
            LinkState::Up
        } else {
            LinkState::Down
        };

        if state != self.state {
            self.state = state;
            bus.monitor_mut().link_changed(state);
        }
        Ok(state)
    }

    /// Update the link state and service the DMA and link-change flags
    ///
    /// A pending link change gets a second PHSTAT2 read, then PHIR is read to
    /// clear the latched PHY interrupt (DS39662E 12.1.5).
    pub fn refresh<SPI, M, D>(
        &mut self,
        bus: &mut Bus<SPI, M>,
        delay: &mut D,
        retry: Retry,
    ) -> Result<LinkState, Error<SPI::Error>>
    where
        SPI: SpiDevice,
        M: Monitor,
        D: DelayNs,
    {
        self.update(bus, delay, retry)?;

        let eir = bus.read_reg(regs::EIR)?;
        if eir & EIR_DMAIF != 0 {
            bus.clear_bits(regs::EIR, EIR_DMAIF)?;
        }

        if eir & EIR_LINKIF != 0 {
            self.update(bus, delay, retry)?;
            read(bus, delay, retry, regs::PHIR)?;
        }

        Ok(self.state)
    }
}
