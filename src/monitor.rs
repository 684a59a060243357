//! Observability hooks
//!
//! The driver reports what it does through a [`Monitor`]. Hooks only observe:
//! nothing a monitor does can change a return value or the register access
//! sequence. [`LogMonitor`] forwards everything to the `log` facade, `()`
//! discards it.

use crate::error::TxFailure;
use crate::phy::LinkState;
use crate::regs::Bank;
use crate::status::{RxStatus, TxStatus};

/// What the receive pipeline decided about a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxVerdict {
    /// Copied into the caller's buffer
    Accepted(usize),
    /// Status vector flagged an error or missing received-OK
    Rejected,
    /// Byte count was zero or larger than the caller's buffer
    BadLength,
}

/// One frame taken off the receive ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxEvent {
    /// Ring position the frame was read from
    pub cursor: u16,
    /// Next-packet pointer stored in front of the frame
    pub next_packet: u16,
    pub status: RxStatus,
    /// Size of the caller's buffer
    pub capacity: usize,
    pub verdict: RxVerdict,
}

/// One completed transmit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEvent {
    pub len: usize,
    pub outcome: Result<TxStatus, TxFailure>,
}

/// Driver event sink
///
/// All methods default to doing nothing.
pub trait Monitor {
    /// About to change ECON1.BSEL (`from` is `None` if the bank is unknown)
    fn bank_switching(&mut self, _from: Option<Bank>, _to: Bank) {}

    /// ECON1.BSEL now selects `bank`
    fn bank_switched(&mut self, _bank: Bank) {}

    fn frame_received(&mut self, _event: &RxEvent) {}

    fn frame_transmitted(&mut self, _event: &TxEvent) {}

    /// The receive logic was reset, ring restarts at `cursor`
    fn rx_ring_reset(&mut self, _cursor: u16) {}

    fn link_changed(&mut self, _state: LinkState) {}

    /// Next-packet pointer disagrees with the position computed from the
    /// previous frame's byte count
    fn ring_inconsistency(&mut self, _cursor: u16, _expected: u16, _actual: u16) {}
}

impl Monitor for () {}

/// Monitor that writes every event to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn bank_switching(&mut self, from: Option<Bank>, to: Bank) {
        log::trace!("[ENC28J60] Bank switch {:?} -> {:?}", from, to);
    }

    fn frame_received(&mut self, event: &RxEvent) {
        match event.verdict {
            RxVerdict::Accepted(len) => log::debug!(
                "[ENC28J60] RX {} bytes at {:#06x}, next {:#06x}",
                len,
                event.cursor,
                event.next_packet
            ),
            RxVerdict::Rejected => log::warn!(
                "[ENC28J60] RX dropped at {:#06x}: status {:?}",
                event.cursor,
                event.status.flags
            ),
            RxVerdict::BadLength => log::warn!(
                "[ENC28J60] RX dropped at {:#06x}: {} bytes, buffer {}",
                event.cursor,
                event.status.byte_count,
                event.capacity
            ),
        }
    }

    fn frame_transmitted(&mut self, event: &TxEvent) {
        match &event.outcome {
            Ok(status) => log::debug!(
                "[ENC28J60] TX {} bytes, {} on wire, {} collisions",
                event.len,
                status.total_bytes_on_wire,
                status.collision_count
            ),
            Err(failure) => log::warn!("[ENC28J60] TX {} bytes {}", event.len, failure),
        }
    }

    fn rx_ring_reset(&mut self, cursor: u16) {
        log::warn!("[ENC28J60] RX logic reset, cursor {:#06x}", cursor);
    }

    fn link_changed(&mut self, state: LinkState) {
        log::info!("[ENC28J60] Link {}", state);
    }

    fn ring_inconsistency(&mut self, cursor: u16, expected: u16, actual: u16) {
        log::error!(
            "[ENC28J60] RX ring inconsistent at {:#06x}: expected next {:#06x}, got {:#06x}",
            cursor,
            expected,
            actual
        );
    }
}
