//! ENC28J60 driver
//!
//! Brings the controller up and moves frames in and out of its buffer memory
//! by polling. There are no interrupts and no DMA; every operation is a
//! sequence of blocking SPI transactions on the caller's thread.
//!
//! ## Bring-up
//!
//! 1. Soft reset, wait 1 ms, read EREVID. Repeat until a known silicon
//!    revision answers (zero means the chip did not come out of reset).
//! 2. Program the RX ring and TX window.
//! 3. MAC setup for full duplex, maximum frame length, inter-packet gaps and
//!    our address.
//! 4. Receive filter, PHY full duplex, half-duplex loopback off.
//! 5. Enable reception and wait for link up.
//!
//! ## References
//! - ENC28J60 Data Sheet (DS39662E), sections 6 and 7
//! - ENC28J60 Silicon Errata (DS80349C), issues 2, 12 and 14

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{Error, TxFailure, Wait};
use crate::filter;
use crate::layout::{self, MAX_FRAME_LENGTH, RX_END, RX_SIZE, RX_START, TX_END, TX_START};
use crate::mac::MacAddress;
use crate::monitor::{LogMonitor, Monitor, RxEvent, RxVerdict, TxEvent};
use crate::phy::{self, LinkMonitor, LinkState};
use crate::poll::poll;
use crate::regs::{self, *};
use crate::status::{RX_STATUS_LEN, RxStatus, TX_STATUS_LEN, TxStatus};

/// Largest frame `transmit` accepts
///
/// The control byte, the frame, the extra byte covered by ETXND and the
/// transmit status vector all have to fit in the TX window. That makes it
/// 1509 bytes, five short of a full 1514-byte Ethernet frame.
pub const MAX_TX_FRAME_LEN: usize = (TX_END - TX_START) as usize - 1 - TX_STATUS_LEN;

/// Next-packet pointer plus receive status vector
const RX_HEADER_LEN: u32 = 2 + RX_STATUS_LEN as u32;

/// EPKTCNT is eight bits wide
const RX_DRAIN_LIMIT: usize = 256;

/// Per-packet control byte: no overrides, MACON3 decides
const TX_CONTROL_DEFAULT: u8 = 0x00;

/// Silicon revisions this driver runs on (EREVID)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiliconRevision {
    B1,
    B4,
    B5,
    B7,
}

impl SiliconRevision {
    pub fn from_erevid(raw: u8) -> Option<Self> {
        match raw & EREVID_MASK {
            0x02 => Some(SiliconRevision::B1),
            0x04 => Some(SiliconRevision::B4),
            0x05 => Some(SiliconRevision::B5),
            0x06 => Some(SiliconRevision::B7),
            _ => None,
        }
    }

    pub fn erevid(self) -> u8 {
        match self {
            SiliconRevision::B1 => 0x02,
            SiliconRevision::B4 => 0x04,
            SiliconRevision::B5 => 0x05,
            SiliconRevision::B7 => 0x06,
        }
    }
}

/// Polled ENC28J60 Ethernet controller
pub struct Enc28j60<SPI, D, M = LogMonitor> {
    bus: Bus<SPI, M>,
    delay: D,
    config: Config,
    /// Ring position of the next frame to read
    next_packet: u16,
    link: LinkMonitor,
    revision: SiliconRevision,
    rx_status: Option<RxStatus>,
    tx_status: Option<TxStatus>,
}

impl<SPI, D> Enc28j60<SPI, D, LogMonitor>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Reset and configure the controller, then wait for link up
    pub fn new(spi: SPI, delay: D, config: Config) -> Result<Self, Error<SPI::Error>> {
        Self::with_monitor(spi, delay, config, LogMonitor)
    }
}

impl<SPI, D, M> Enc28j60<SPI, D, M>
where
    SPI: SpiDevice,
    D: DelayNs,
    M: Monitor,
{
    /// Same as [`Enc28j60::new`] with a custom event sink
    pub fn with_monitor(
        spi: SPI,
        mut delay: D,
        config: Config,
        monitor: M,
    ) -> Result<Self, Error<SPI::Error>> {
        let mut bus = Bus::new(spi, monitor);
        let revision = probe_revision(&mut bus, &mut delay, &config)?;
        log::info!("[ENC28J60] Silicon revision {:?}", revision);

        let mut dev = Self {
            bus,
            delay,
            config,
            next_packet: RX_START,
            link: LinkMonitor::new(),
            revision,
            rx_status: None,
            tx_status: None,
        };
        dev.configure()?;
        Ok(dev)
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    fn configure(&mut self) -> Result<(), Error<SPI::Error>> {
        self.next_packet = layout::configure_all(&mut self.bus)?;
        self.configure_mac()?;
        filter::configure(&mut self.bus, self.config.pattern_filter)?;
        self.configure_phy()?;
        self.enable_rx()?;

        log::info!("[ENC28J60] MAC {}, waiting for link", self.config.mac);
        self.await_link()?;
        log::info!("[ENC28J60] Ready");
        Ok(())
    }

    /// Full duplex MAC setup (DS39662E 6.5)
    fn configure_mac(&mut self) -> Result<(), Error<SPI::Error>> {
        let bus = &mut self.bus;
        bus.set_bits(MACON1, MACON1_MARXEN | MACON1_TXPAUS | MACON1_RXPAUS)?;
        bus.set_bits(
            MACON3,
            MACON3_PADCFG0 | MACON3_TXCRCEN | MACON3_FRMLNEN | MACON3_FULDPX,
        )?;
        bus.write_reg_pair(MAMXFLL, MAMXFLH, MAX_FRAME_LENGTH)?;
        bus.write_reg(MABBIPG, MABBIPG_FULL_DUPLEX)?;
        bus.write_reg(MAIPGL, MAIPGL_DEFAULT)?;
        bus.write_reg(MAIPGH, MAIPGH_DEFAULT)?;

        for (reg, byte) in MAADR.iter().zip(self.config.mac.as_bytes()) {
            bus.write_reg(*reg, *byte)?;
        }
        Ok(())
    }

    /// PHY duplex must match MACON3.FULDPX; loopback off (DS39662E 6.6)
    fn configure_phy(&mut self) -> Result<(), Error<SPI::Error>> {
        let retry = self.config.mii_wait;
        phy::write(&mut self.bus, &mut self.delay, retry, PHCON1, PHCON1_PDPXMD)?;
        phy::write(&mut self.bus, &mut self.delay, retry, PHCON2, PHCON2_HDLDIS)
    }

    fn await_link(&mut self) -> Result<(), Error<SPI::Error>> {
        let Self {
            bus,
            delay,
            link,
            config,
            ..
        } = self;
        let mii_wait = config.mii_wait;

        poll(delay, config.link_wait, Wait::Link, |delay| {
            Ok(link.refresh(bus, delay, mii_wait)?.is_up().then_some(()))
        })
    }

    fn enable_rx(&mut self) -> Result<(), Error<SPI::Error>> {
        self.bus.clear_bits(EIR, EIR_RXERIF)?;
        self.bus.set_bits(ECON1, ECON1_RXEN)
    }

    fn disable_rx(&mut self) -> Result<(), Error<SPI::Error>> {
        self.bus.clear_bits(ECON1, ECON1_RXEN)
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Reset the receive logic and restart the ring (DS39662E 11.4)
    ///
    /// Pending packets are released first so EPKTCNT starts from zero.
    pub fn reset_rx(&mut self) -> Result<(), Error<SPI::Error>> {
        self.disable_rx()?;

        for _ in 0..RX_DRAIN_LIMIT {
            if self.bus.read_reg(EPKTCNT)? == 0 {
                break;
            }
            self.bus.set_bits(ECON2, ECON2_PKTDEC)?;
        }

        self.bus.set_bits(ECON1, ECON1_RXRST)?;
        self.bus.clear_bits(ECON1, ECON1_RXRST)?;

        self.next_packet = layout::configure_receive_window(&mut self.bus)?;
        self.enable_rx()?;

        self.bus.monitor_mut().rx_ring_reset(self.next_packet);
        Ok(())
    }

    /// Reset the transmit logic (DS39662E 11.3)
    pub fn reset_tx(&mut self) -> Result<(), Error<SPI::Error>> {
        self.bus.set_bits(ECON1, ECON1_TXRST)?;
        self.bus.clear_bits(ECON1, ECON1_TXRST)?;
        layout::configure_transmit_window(&mut self.bus)
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Take one frame off the receive ring
    ///
    /// Returns the frame length, or 0 when nothing is pending or the frame
    /// was dropped. A dropped frame still advances the ring.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Error<SPI::Error>> {
        if self.bus.read_reg(EPKTCNT)? == 0 {
            return Ok(0);
        }

        let cursor = self.next_packet;
        if !(RX_START..=RX_END).contains(&cursor) {
            log::warn!("[ENC28J60] Ring cursor {:#06x} outside the RX window", cursor);
            self.reset_rx()?;
            self.refresh_link()?;
            return Ok(0);
        }

        self.bus.set_read_pointer(cursor)?;

        let mut next = [0u8; 2];
        self.bus.read_buffer(&mut next)?;
        let next_packet = u16::from_le_bytes(next);

        let mut raw = [0u8; RX_STATUS_LEN];
        self.bus.read_buffer(&mut raw)?;
        let status = RxStatus::from_bytes(raw);
        self.rx_status = Some(status);

        let len = status.byte_count as usize;
        let verdict = if !status.is_intact() {
            RxVerdict::Rejected
        } else if len == 0 || len > buf.len() {
            RxVerdict::BadLength
        } else {
            self.bus.read_buffer(&mut buf[..len])?;
            RxVerdict::Accepted(len)
        };

        self.check_ring(cursor, status, next_packet);

        // ERXRDPT before PKTDEC (DS80349C issue 14)
        self.bus
            .write_reg_pair(ERXRDPTL, ERXRDPTH, layout::fix_read_pointer(next_packet))?;
        self.bus.set_bits(ECON2, ECON2_PKTDEC)?;
        self.next_packet = next_packet;

        self.bus.monitor_mut().frame_received(&RxEvent {
            cursor,
            next_packet,
            status,
            capacity: buf.len(),
            verdict,
        });

        Ok(match verdict {
            RxVerdict::Accepted(len) => len,
            RxVerdict::Rejected | RxVerdict::BadLength => 0,
        })
    }

    /// Compare the stored next-packet pointer with the record size
    fn check_ring(&mut self, cursor: u16, status: RxStatus, next_packet: u16) {
        let record = (RX_HEADER_LEN + status.byte_count as u32 + 1) & !1;
        let expected = layout::wrap_rx_pointer(cursor, (record % RX_SIZE as u32) as u16);
        if expected != next_packet {
            self.bus
                .monitor_mut()
                .ring_inconsistency(cursor, expected, next_packet);
        }
    }

    // ========================================================================
    // Transmit
    // ========================================================================

    /// Send one frame and wait until the controller is done with it
    pub fn transmit(&mut self, frame: &[u8]) -> Result<(), Error<SPI::Error>> {
        if frame.is_empty() {
            return Err(Error::FrameEmpty);
        }
        if frame.len() > MAX_TX_FRAME_LEN {
            return Err(Error::FrameTooLarge {
                len: frame.len(),
                max: MAX_TX_FRAME_LEN,
            });
        }

        if self.bus.read_reg(EIR)? & EIR_TXERIF != 0 {
            // DS80349C issue 12
            log::warn!("[ENC28J60] Clearing latched transmit error");
            self.bus.set_bits(ECON1, ECON1_TXRTS)?;
            self.bus.clear_bits(ECON1, ECON1_TXRTS)?;
            self.bus.clear_bits(EIR, EIR_TXERIF)?;
            self.delay.delay_ms(self.config.tx_error_recovery_delay_ms);
        }

        let start = TX_START;
        let end = start + frame.len() as u16 + 1;

        self.bus.write_reg_pair(ETXSTL, ETXSTH, start)?;
        self.bus.set_write_pointer(start)?;
        self.bus.write_buffer_byte(TX_CONTROL_DEFAULT)?;
        self.bus.write_buffer(frame)?;
        self.bus.write_reg_pair(ETXNDL, ETXNDH, end)?;

        self.bus.clear_bits(EIR, EIR_TXIF)?;
        self.bus.set_bits(ECON1, ECON1_TXRTS)?;

        let retry = self.config.transmit_wait;
        let bus = &mut self.bus;
        let sent = poll(&mut self.delay, retry, Wait::TransmitRequest, |_| {
            Ok((bus.read_reg(ECON1)? & ECON1_TXRTS == 0).then_some(()))
        });
        if let Err(Error::Timeout(wait)) = sent {
            // TXRTS must be low again or the next request has no rising edge
            log::warn!("[ENC28J60] Transmit request stuck, resetting TX logic");
            self.bus.clear_bits(ECON1, ECON1_TXRTS)?;
            self.reset_tx()?;
            return Err(Error::Timeout(wait));
        }
        sent?;

        if self.bus.read_reg(EIR)? & EIR_TXIF != 0 {
            let estat = self.bus.read_reg(ESTAT)?;
            let failure = TxFailure {
                aborted: estat & ESTAT_TXABRT != 0,
                late_collision: estat & ESTAT_LATECOL != 0,
            };
            if failure.aborted || failure.late_collision {
                self.bus.monitor_mut().frame_transmitted(&TxEvent {
                    len: frame.len(),
                    outcome: Err(failure),
                });
                self.refresh_link()?;
                return Err(Error::TransmitFailed(failure));
            }
        } else {
            self.bus.clear_bits(EIR, EIR_TXIF)?;
        }

        let bus = &mut self.bus;
        let status = poll(&mut self.delay, retry, Wait::TransmitStatus, |_| {
            bus.set_read_pointer(end + 1)?;
            let mut raw = [0u8; TX_STATUS_LEN];
            bus.read_buffer(&mut raw)?;
            let status = TxStatus::from_bytes(raw);
            Ok(status.done().then_some(status))
        })?;

        self.tx_status = Some(status);
        self.bus.monitor_mut().frame_transmitted(&TxEvent {
            len: frame.len(),
            outcome: Ok(status),
        });
        Ok(())
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Read the PHY and return the current link state
    pub fn line_status(&mut self) -> Result<LinkState, Error<SPI::Error>> {
        self.refresh_link()
    }

    fn refresh_link(&mut self) -> Result<LinkState, Error<SPI::Error>> {
        let retry = self.config.mii_wait;
        self.link.refresh(&mut self.bus, &mut self.delay, retry)
    }

    /// Link state from the last PHY read
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn mac_address(&self) -> MacAddress {
        self.config.mac
    }

    pub fn revision(&self) -> SiliconRevision {
        self.revision
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn last_rx_status(&self) -> Option<RxStatus> {
        self.rx_status
    }

    pub fn last_tx_status(&self) -> Option<TxStatus> {
        self.tx_status
    }

    /// Ring position the next `receive` reads from
    pub fn ring_cursor(&self) -> u16 {
        self.next_packet
    }

    pub fn monitor(&self) -> &M {
        self.bus.monitor()
    }

    /// Give back the SPI device and delay
    pub fn release(self) -> (SPI, D) {
        let (spi, _monitor) = self.bus.release();
        (spi, self.delay)
    }
}

/// Reset the chip until EREVID reports a supported revision
fn probe_revision<SPI, M, D>(
    bus: &mut Bus<SPI, M>,
    delay: &mut D,
    config: &Config,
) -> Result<SiliconRevision, Error<SPI::Error>>
where
    SPI: SpiDevice,
    M: Monitor,
    D: DelayNs,
{
    poll(delay, config.revision_probe, Wait::Revision, |delay| {
        bus.soft_reset()?;
        // DS80349C issue 2: CLKRDY is unreliable, wait instead
        delay.delay_ms(1);

        let raw = bus.read_reg(regs::EREVID)? & EREVID_MASK;
        match SiliconRevision::from_erevid(raw) {
            Some(revision) => Ok(Some(revision)),
            None if raw == 0 => {
                log::warn!("[ENC28J60] No response after reset, retrying");
                Ok(None)
            }
            None => {
                log::warn!("[ENC28J60] Unknown silicon revision {:#04x}, retrying", raw);
                Ok(None)
            }
        }
    })
}
