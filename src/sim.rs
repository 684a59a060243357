//! Register-level ENC28J60 model for host tests
//!
//! [`SimChip`] speaks the SPI instruction set over `SpiDevice` and keeps just
//! enough chip behaviour to exercise the driver: banked registers, buffer
//! memory with auto-increment, the MII handshake, the packet counter, the
//! transmit state machine and the silicon revision register. Every
//! transaction is logged (MOSI bytes only) so tests can assert on exact
//! register access sequences.
//!
//! The handle is cheap to clone; clones share the same chip.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::error::TxFailure;
use crate::layout::{self, RX_END, RX_START, wrap_rx_pointer};
use crate::regs::*;
use crate::status::{RxFlags, RxStatus, TxFlags, TxStatus};

const MEMORY_SIZE: usize = layout::BUFFER_SIZE as usize;

/// Silicon revision reported when nothing else is queued (B7)
const DEFAULT_REVISION: u8 = 0x06;

struct SimState {
    /// Banked registers; offsets 0x1B..=0x1F live in bank 0 only
    regs: [[u8; 32]; 4],
    memory: Vec<u8>,
    phy: [u16; 32],

    erdpt: u16,
    ewrpt: u16,
    /// Where the next injected frame is written
    rx_write: u16,

    revisions: VecDeque<u8>,
    mii_busy_polls: u32,
    mii_busy: u32,

    tx_pending: bool,
    txrts_polls: u32,
    txrts_remaining: u32,
    tx_failure: Option<TxFailure>,
    tsv_stuck: bool,
    txif_on_completion: bool,
    tx_frames: Vec<Vec<u8>>,
    econ1_reads_while_pending: u32,

    read_pointer_history: Vec<u16>,
    log: Vec<Vec<u8>>,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            regs: [[0; 32]; 4],
            memory: vec![0; MEMORY_SIZE],
            phy: [0; 32],
            erdpt: 0,
            ewrpt: 0,
            rx_write: RX_START,
            revisions: VecDeque::from([DEFAULT_REVISION]),
            mii_busy_polls: 0,
            mii_busy: 0,
            tx_pending: false,
            txrts_polls: 0,
            txrts_remaining: 0,
            tx_failure: None,
            tsv_stuck: false,
            txif_on_completion: true,
            tx_frames: Vec::new(),
            econ1_reads_while_pending: 0,
            read_pointer_history: Vec::new(),
            log: Vec::new(),
        };
        state.reset_registers();
        state
    }

    /// Power-on values for the registers the driver cares about
    fn reset_registers(&mut self) {
        self.regs = [[0; 32]; 4];
        self.set_pair(ERXNDL, 0x1FFF);
        self.set_pair(ERXSTL, 0x05FA);
        self.store(ESTAT, ESTAT_CLKRDY);
        self.erdpt = 0x05FA;
        self.ewrpt = 0;
        self.rx_write = RX_START;
        self.mii_busy = 0;
        self.tx_pending = false;
        // The link interrupt survives: the PHY is not reset by SRC
        if self.phy[PHIR as usize] & PHIR_PLNKIF != 0 {
            self.store(EIR, EIR_LINKIF);
        }
    }

    fn bank(&self) -> usize {
        (self.regs[0][ECON1.offset() as usize] & (ECON1_BSEL1 | ECON1_BSEL0)) as usize
    }

    fn slot(&self, offset: u8) -> (usize, usize) {
        if offset >= EIE.offset() {
            (0, offset as usize)
        } else {
            (self.bank(), offset as usize)
        }
    }

    fn is_mac_mii(&self, offset: u8) -> bool {
        match (self.slot(offset).0, offset) {
            (2, 0x00..=0x19) => true,
            (3, 0x00..=0x05) | (3, 0x0A) => true,
            _ => false,
        }
    }

    /// Register constant, bank and slot index for an opcode offset
    fn resolve(&self, offset: u8) -> (Register, usize, usize) {
        let (bank, index) = self.slot(offset);
        let flag = if self.is_mac_mii(offset) { 0x80 } else { 0 };
        (Register::from_raw(flag | ((bank as u8) << 5) | offset), bank, index)
    }

    fn load(&self, reg: Register) -> u8 {
        self.regs[reg.bank() as usize][reg.offset() as usize]
    }

    fn store(&mut self, reg: Register, value: u8) {
        let bank = if reg.is_common() { 0 } else { reg.bank() as usize };
        self.regs[bank][reg.offset() as usize] = value;
    }

    fn pair(&self, low: Register) -> u16 {
        let high = Register::from_raw(low.raw() + 1);
        u16::from_le_bytes([self.load(low), self.load(high)])
    }

    fn set_pair(&mut self, low: Register, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.store(low, lo);
        self.store(Register::from_raw(low.raw() + 1), hi);
    }

    // ------------------------------------------------------------------------
    // Control registers
    // ------------------------------------------------------------------------

    fn read_register(&mut self, offset: u8) -> u8 {
        let (reg, bank, index) = self.resolve(offset);

        if reg == ECON1 && self.tx_pending {
            self.econ1_reads_while_pending += 1;
            if self.txrts_remaining == 0 {
                self.complete_transmit();
            } else if self.txrts_remaining != u32::MAX {
                self.txrts_remaining -= 1;
            }
        } else if reg == MISTAT {
            let busy = if self.mii_busy > 0 { MISTAT_BUSY } else { 0 };
            if self.mii_busy != u32::MAX {
                self.mii_busy = self.mii_busy.saturating_sub(1);
            }
            return busy;
        } else if reg == EREVID {
            let revision = if self.revisions.len() > 1 {
                self.revisions.pop_front().unwrap_or(DEFAULT_REVISION)
            } else {
                self.revisions.front().copied().unwrap_or(DEFAULT_REVISION)
            };
            return revision;
        }

        self.regs[bank][index]
    }

    fn write_register(&mut self, offset: u8, value: u8) {
        let (reg, bank, index) = self.resolve(offset);
        let old = self.regs[bank][index];
        self.regs[bank][index] = value;
        let rising = value & !old;
        let falling = old & !value;

        match reg {
            ECON1 => {
                if rising & ECON1_TXRTS != 0 {
                    self.tx_pending = true;
                    self.txrts_remaining = self.txrts_polls;
                }
                if falling & ECON1_TXRTS != 0 {
                    // Cleared before the transmission started
                    self.tx_pending = false;
                }
                if rising & ECON1_TXRST != 0 {
                    self.tx_pending = false;
                    let econ1 = self.load(ECON1);
                    self.store(ECON1, econ1 & !ECON1_TXRTS);
                }
                if rising & ECON1_RXRST != 0 {
                    self.rx_write = self.pair(ERXSTL);
                }
            }
            ECON2 => {
                if value & ECON2_PKTDEC != 0 {
                    let count = self.load(EPKTCNT);
                    self.store(EPKTCNT, count.saturating_sub(1));
                    self.store(ECON2, value & !ECON2_PKTDEC);
                }
            }
            ERDPTL | ERDPTH => self.erdpt = self.pair(ERDPTL),
            EWRPTL | EWRPTH => self.ewrpt = self.pair(EWRPTL),
            ERXRDPTH => {
                let ptr = self.pair(ERXRDPTL);
                self.read_pointer_history.push(ptr);
            }
            MICMD => {
                if rising & MICMD_MIIRD != 0 {
                    self.mii_read();
                }
            }
            MIWRH => {
                let address = (self.load(MIREGADR) & 0x1F) as usize;
                self.phy[address] = u16::from_le_bytes([self.load(MIWRL), value]);
                self.mii_busy = self.mii_busy_polls;
            }
            _ => {}
        }
    }

    fn mii_read(&mut self) {
        let address = self.load(MIREGADR) & 0x1F;
        let [low, high] = self.phy[address as usize].to_le_bytes();
        self.store(MIRDL, low);
        self.store(MIRDH, high);
        self.mii_busy = self.mii_busy_polls;

        if address == PHIR {
            self.phy[PHIR as usize] &= !PHIR_PLNKIF;
            let eir = self.load(EIR);
            self.store(EIR, eir & !EIR_LINKIF);
        }
    }

    fn complete_transmit(&mut self) {
        self.tx_pending = false;
        let econ1 = self.load(ECON1);
        self.store(ECON1, econ1 & !ECON1_TXRTS);

        let estat = self.load(ESTAT) & !(ESTAT_TXABRT | ESTAT_LATECOL);
        let start = self.pair(ETXSTL);
        let end = self.pair(ETXNDL);

        if let Some(failure) = self.tx_failure.take() {
            let mut flags = 0;
            if failure.aborted {
                flags |= ESTAT_TXABRT;
            }
            if failure.late_collision {
                flags |= ESTAT_LATECOL;
            }
            self.store(ESTAT, estat | flags);
            let eir = self.load(EIR);
            self.store(EIR, eir | EIR_TXERIF | EIR_TXIF);
            return;
        }
        self.store(ESTAT, estat);

        // Control byte at ETXST, frame runs to ETXND inclusive
        let frame: Vec<u8> = (start + 1..=end)
            .map(|addr| self.memory[addr as usize % MEMORY_SIZE])
            .collect();
        self.tx_frames.push(frame);

        let count = end.wrapping_sub(start);
        let status = TxStatus {
            byte_count: count,
            collision_count: 0,
            total_bytes_on_wire: count,
            flags: if self.tsv_stuck {
                TxFlags::empty()
            } else {
                TxFlags::DONE
            },
        };
        for (i, byte) in status.to_bytes().iter().enumerate() {
            self.memory[(end as usize + 1 + i) % MEMORY_SIZE] = *byte;
        }

        if self.txif_on_completion {
            let eir = self.load(EIR);
            self.store(EIR, eir | EIR_TXIF);
        }
    }

    // ------------------------------------------------------------------------
    // Buffer memory
    // ------------------------------------------------------------------------

    fn read_memory(&mut self) -> u8 {
        let byte = self.memory[self.erdpt as usize % MEMORY_SIZE];
        self.erdpt = if self.erdpt == self.pair(ERXNDL) {
            self.pair(ERXSTL)
        } else {
            (self.erdpt + 1) % layout::BUFFER_SIZE
        };
        byte
    }

    fn write_memory(&mut self, byte: u8) {
        self.memory[self.ewrpt as usize % MEMORY_SIZE] = byte;
        self.ewrpt = (self.ewrpt + 1) % layout::BUFFER_SIZE;
    }

    fn write_ring(&mut self, at: u16, bytes: &[u8]) {
        let mut ptr = at;
        for byte in bytes {
            self.memory[ptr as usize] = *byte;
            ptr = wrap_rx_pointer(ptr, 1);
        }
    }
}

/// One SPI transaction in progress
struct Transfer {
    opcode: Option<u8>,
    data_index: usize,
    read_value: u8,
    dummy: bool,
    mosi: Vec<u8>,
}

impl Transfer {
    fn new() -> Self {
        Self {
            opcode: None,
            data_index: 0,
            read_value: 0,
            dummy: false,
            mosi: Vec::new(),
        }
    }

    /// Full-duplex exchange of one byte
    fn exchange(&mut self, state: &mut SimState, byte: u8, written: bool) -> u8 {
        if written {
            self.mosi.push(byte);
        }

        let Some(opcode) = self.opcode else {
            self.opcode = Some(byte);
            match byte {
                OP_SOFT_RESET => state.reset_registers(),
                OP_READ_BUF_MEM | OP_WRITE_BUF_MEM => {}
                _ if byte & 0xE0 == OP_READ_CTRL_REG => {
                    let offset = byte & 0x1F;
                    self.dummy = state.is_mac_mii(offset);
                    self.read_value = state.read_register(offset);
                }
                _ => {}
            }
            return 0;
        };

        let index = self.data_index;
        self.data_index += 1;

        match opcode {
            OP_READ_BUF_MEM => state.read_memory(),
            OP_WRITE_BUF_MEM => {
                state.write_memory(byte);
                0
            }
            OP_SOFT_RESET => 0,
            _ => {
                let offset = opcode & 0x1F;
                match opcode & 0xE0 {
                    OP_READ_CTRL_REG if self.dummy && index == 0 => 0,
                    OP_READ_CTRL_REG => self.read_value,
                    OP_WRITE_CTRL_REG if index == 0 => {
                        state.write_register(offset, byte);
                        0
                    }
                    OP_BIT_FIELD_SET if index == 0 => {
                        let (bank, slot) = state.slot(offset);
                        let value = state.regs[bank][slot] | byte;
                        state.write_register(offset, value);
                        0
                    }
                    OP_BIT_FIELD_CLEAR if index == 0 => {
                        let (bank, slot) = state.slot(offset);
                        let value = state.regs[bank][slot] & !byte;
                        state.write_register(offset, value);
                        0
                    }
                    _ => 0,
                }
            }
        }
    }
}

/// Simulated ENC28J60 on an SPI bus
#[derive(Clone)]
pub(crate) struct SimChip(Rc<RefCell<SimState>>);

impl SimChip {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SimState::new())))
    }

    /// Bank selected by ECON1.BSEL
    pub fn bank(&self) -> Bank {
        match self.0.borrow().bank() {
            0 => Bank::Bank0,
            1 => Bank::Bank1,
            2 => Bank::Bank2,
            _ => Bank::Bank3,
        }
    }

    /// Set a register without going through SPI
    pub fn poke(&self, reg: Register, value: u8) {
        self.0.borrow_mut().store(reg, value);
    }

    /// Read a register without side effects
    pub fn peek(&self, reg: Register) -> u8 {
        self.0.borrow().load(reg)
    }

    pub fn peek_pair(&self, low: Register) -> u16 {
        self.0.borrow().pair(low)
    }

    pub fn memory(&self, at: u16, len: usize) -> Vec<u8> {
        let state = self.0.borrow();
        (0..len)
            .map(|i| state.memory[(at as usize + i) % MEMORY_SIZE])
            .collect()
    }

    pub fn set_phy(&self, reg: u8, value: u16) {
        self.0.borrow_mut().phy[reg as usize] = value;
    }

    pub fn phy(&self, reg: u8) -> u16 {
        self.0.borrow().phy[reg as usize]
    }

    /// MISTAT.BUSY stays set for `polls` reads after each MII command
    pub fn set_mii_busy_polls(&self, polls: u32) {
        self.0.borrow_mut().mii_busy_polls = polls;
    }

    /// Values EREVID returns, in order; the last one repeats
    pub fn set_revisions(&self, revisions: &[u8]) {
        self.0.borrow_mut().revisions = revisions.iter().copied().collect();
    }

    /// Cable plugged in or pulled; raises the link change interrupt
    pub fn set_link(&self, up: bool) {
        let mut state = self.0.borrow_mut();
        let phstat2 = state.phy[PHSTAT2 as usize];
        let was_up = phstat2 & PHSTAT2_LSTAT != 0;
        if up == was_up {
            return;
        }

        if up {
            state.phy[PHSTAT2 as usize] = phstat2 | PHSTAT2_LSTAT;
            state.phy[PHSTAT1 as usize] |= PHSTAT1_LLSTAT;
        } else {
            state.phy[PHSTAT2 as usize] = phstat2 & !PHSTAT2_LSTAT;
            state.phy[PHSTAT1 as usize] &= !PHSTAT1_LLSTAT;
        }
        state.phy[PHIR as usize] |= PHIR_PLNKIF;
        let eir = state.load(EIR);
        state.store(EIR, eir | EIR_LINKIF);
    }

    /// Place a received frame in the RX ring and bump EPKTCNT
    ///
    /// Returns the ring position the frame starts at.
    pub fn inject_frame(&self, payload: &[u8], flags: RxFlags) -> u16 {
        let status = RxStatus {
            byte_count: payload.len() as u16,
            flags,
        };
        self.inject_record(None, status, payload)
    }

    /// Place a raw receive record; `next` overrides the next-packet pointer
    pub fn inject_record(&self, next: Option<u16>, status: RxStatus, payload: &[u8]) -> u16 {
        let mut state = self.0.borrow_mut();
        let at = state.rx_write;
        let record_len = 6 + payload.len() as u16;
        let computed = wrap_rx_pointer(at, (record_len + 1) & !1);
        let next = next.unwrap_or(computed);

        let [n0, n1] = next.to_le_bytes();
        let mut record = vec![n0, n1];
        record.extend_from_slice(&status.to_bytes());
        record.extend_from_slice(payload);
        state.write_ring(at, &record);
        state.rx_write = computed;

        let count = state.load(EPKTCNT);
        state.store(EPKTCNT, count.saturating_add(1));
        let eir = state.load(EIR);
        state.store(EIR, eir | EIR_PKTIF);
        at
    }

    /// Make the next transmission fail with these ESTAT flags
    pub fn fail_next_tx(&self, failure: TxFailure) {
        self.0.borrow_mut().tx_failure = Some(failure);
    }

    /// Never set the done bit in the transmit status vector
    pub fn set_tsv_stuck(&self, stuck: bool) {
        self.0.borrow_mut().tsv_stuck = stuck;
    }

    /// Whether a successful transmission raises EIR.TXIF
    pub fn set_txif_on_completion(&self, raise: bool) {
        self.0.borrow_mut().txif_on_completion = raise;
    }

    /// Keep ECON1.TXRTS set for `polls` reads (`u32::MAX` = forever)
    pub fn set_txrts_polls(&self, polls: u32) {
        self.0.borrow_mut().txrts_polls = polls;
    }

    /// ECON1 reads seen while a transmission was pending
    pub fn txrts_polls(&self) -> u32 {
        self.0.borrow().econ1_reads_while_pending
    }

    /// Frames put on the wire so far
    pub fn tx_frames(&self) -> Vec<Vec<u8>> {
        self.0.borrow().tx_frames.clone()
    }

    /// Every value written to ERXRDPT, completed by the high byte write
    pub fn read_pointer_history(&self) -> Vec<u16> {
        self.0.borrow().read_pointer_history.clone()
    }

    /// MOSI bytes of each transaction so far
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    /// Transactions whose first byte satisfies `pred`
    pub fn count_ops(&self, pred: impl Fn(u8) -> bool) -> usize {
        self.0
            .borrow()
            .log
            .iter()
            .filter(|t| t.first().is_some_and(|op| pred(*op)))
            .count()
    }
}

impl ErrorType for SimChip {
    type Error = Infallible;
}

impl SpiDevice for SimChip {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut state = self.0.borrow_mut();
        let mut transfer = Transfer::new();

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for byte in bytes.iter() {
                        transfer.exchange(&mut state, *byte, true);
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = transfer.exchange(&mut state, 0, false);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let out = match write.get(i) {
                            Some(byte) => transfer.exchange(&mut state, *byte, true),
                            None => transfer.exchange(&mut state, 0, false),
                        };
                        if let Some(slot) = read.get_mut(i) {
                            *slot = out;
                        }
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = transfer.exchange(&mut state, *slot, true);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }

        state.log.push(transfer.mosi);
        Ok(())
    }
}

/// `DelayNs` that records every requested delay
#[derive(Debug, Default)]
pub(crate) struct RecordingDelay {
    delays_ns: Vec<u64>,
}

impl RecordingDelay {
    pub fn calls(&self) -> usize {
        self.delays_ns.len()
    }

    pub fn total_us(&self) -> u64 {
        self.delays_ns.iter().sum::<u64>() / 1_000
    }

    /// Each delay in microseconds
    pub fn delays_us(&self) -> Vec<u64> {
        self.delays_ns.iter().map(|ns| ns / 1_000).collect()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ns.push(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.delays_ns.push(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ns.push(ms as u64 * 1_000_000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(chip: &mut SimChip, bytes: &[u8], read: usize) -> Vec<u8> {
        let mut rx = vec![0u8; read];
        chip.transaction(&mut [Operation::Write(bytes), Operation::Read(&mut rx)])
            .unwrap();
        rx
    }

    #[test]
    fn read_memory_wraps_at_receive_end() {
        let mut chip = SimChip::new();
        chip.poke(ERXSTL, 0);
        chip.poke(ERXSTH, 0);
        chip.poke(ERXNDL, RX_END as u8);
        chip.poke(ERXNDH, (RX_END >> 8) as u8);

        let at = chip.inject_record(Some(0), RxStatus::default(), &[]);
        assert_eq!(at, RX_START);

        exchange(&mut chip, &[OP_WRITE_CTRL_REG | ERDPTL.offset(), 0x11], 0);
        exchange(&mut chip, &[OP_WRITE_CTRL_REG | ERDPTH.offset(), 0x1A], 0);
        let bytes = exchange(&mut chip, &[OP_READ_BUF_MEM], 2);
        // RX_END, then back to RX_START
        assert_eq!(bytes, vec![0, 0]);
        assert_eq!(chip.0.borrow().erdpt, 1);
    }

    #[test]
    fn injected_records_are_even_aligned() {
        let chip = SimChip::new();
        let first = chip.inject_frame(&[1, 2, 3], RxFlags::RECEIVED_OK);
        let second = chip.inject_frame(&[4], RxFlags::RECEIVED_OK);
        assert_eq!(first, 0);
        assert_eq!(second, 10);
        assert_eq!(chip.memory(0, 2), vec![10, 0]);
        assert_eq!(chip.peek(EPKTCNT), 2);
    }

    #[test]
    fn revision_queue_repeats_last_value() {
        let mut chip = SimChip::new();
        chip.set_revisions(&[0x00, 0x06]);
        // Select bank 3 for EREVID
        exchange(&mut chip, &[OP_BIT_FIELD_SET | ECON1.offset(), 0x03], 0);
        let read = |chip: &mut SimChip| exchange(chip, &[OP_READ_CTRL_REG | EREVID.offset()], 1)[0];
        assert_eq!(read(&mut chip), 0x00);
        assert_eq!(read(&mut chip), 0x06);
        assert_eq!(read(&mut chip), 0x06);
    }

    #[test]
    fn recording_delay_units() {
        let mut delay = RecordingDelay::default();
        delay.delay_ms(2);
        delay.delay_us(11);
        assert_eq!(delay.calls(), 2);
        assert_eq!(delay.total_us(), 2011);
        assert_eq!(delay.delays_us(), vec![2000, 11]);
    }
}
