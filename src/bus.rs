//! SPI register and buffer memory access
//!
//! Every control register access is one SPI transaction: an opcode OR-ed with
//! the 5-bit register offset, then the data byte. Before the transaction the
//! correct bank is selected through ECON1.BSEL1:BSEL0. The selected bank is
//! cached so that consecutive accesses to the same bank cost one transaction
//! instead of three.
//!
//! Buffer memory opcodes (RBM/WBM) are bank independent. The controller
//! auto-increments ERDPT/EWRPT across a single transaction, so a multi-byte
//! read or write is one opcode followed by the data.

use embedded_hal::spi::{Operation, SpiDevice};

use crate::error::Error;
use crate::monitor::Monitor;
use crate::regs::{
    self, Bank, ECON1, ECON1_BSEL0, ECON1_BSEL1, OP_BIT_FIELD_CLEAR, OP_BIT_FIELD_SET,
    OP_READ_BUF_MEM, OP_READ_CTRL_REG, OP_SOFT_RESET, OP_WRITE_BUF_MEM, OP_WRITE_CTRL_REG,
    Register,
};

/// Register Access Layer and Buffer Memory Access over one SPI device
pub struct Bus<SPI, M> {
    spi: SPI,
    /// Bank currently selected in ECON1, `None` until the first switch
    bank: Option<Bank>,
    monitor: M,
}

impl<SPI, M> Bus<SPI, M>
where
    SPI: SpiDevice,
    M: Monitor,
{
    pub fn new(spi: SPI, monitor: M) -> Self {
        Self {
            spi,
            bank: None,
            monitor,
        }
    }

    /// Give back the SPI device
    pub fn release(self) -> (SPI, M) {
        (self.spi, self.monitor)
    }

    #[cfg(test)]
    pub(crate) fn spi(&self) -> &SPI {
        &self.spi
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut M {
        &mut self.monitor
    }

    /// Bank the cache believes is selected
    pub fn cached_bank(&self) -> Option<Bank> {
        self.bank
    }

    /// Forget the cached bank so the next banked access reselects it
    pub fn invalidate_bank(&mut self) {
        self.bank = None;
    }

    // ========================================================================
    // Bank Selection
    // ========================================================================

    /// Make sure `reg`'s bank is selected
    ///
    /// Common registers never switch. Otherwise both BSEL bits are cleared and
    /// the new bank's bits set, unless the cache already holds that bank.
    pub fn select_bank(&mut self, reg: Register) -> Result<(), Error<SPI::Error>> {
        if reg.is_common() {
            return Ok(());
        }

        let bank = reg.bank();
        if self.bank == Some(bank) {
            return Ok(());
        }

        self.monitor.bank_switching(self.bank, bank);

        // ECON1 is common, so these two never recurse into select_bank
        self.bit_op(OP_BIT_FIELD_CLEAR, ECON1, ECON1_BSEL1 | ECON1_BSEL0)?;
        self.bit_op(OP_BIT_FIELD_SET, ECON1, bank.bsel_bits())?;
        self.bank = Some(bank);

        self.monitor.bank_switched(bank);
        Ok(())
    }

    // ========================================================================
    // Control Registers
    // ========================================================================

    /// Read a control register (RCR)
    ///
    /// MAC/MII registers shift out one dummy byte before the data.
    pub fn read_reg(&mut self, reg: Register) -> Result<u8, Error<SPI::Error>> {
        self.select_bank(reg)?;

        let mut rx = [0u8; 2];
        let len = if reg.is_mac_mii() { 2 } else { 1 };
        self.spi
            .transaction(&mut [
                Operation::Write(&[OP_READ_CTRL_REG | reg.offset()]),
                Operation::Read(&mut rx[..len]),
            ])
            .map_err(Error::Spi)?;

        Ok(rx[len - 1])
    }

    /// Write a control register (WCR)
    pub fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), Error<SPI::Error>> {
        self.select_bank(reg)?;
        self.spi
            .transaction(&mut [Operation::Write(&[OP_WRITE_CTRL_REG | reg.offset(), value])])
            .map_err(Error::Spi)
    }

    /// Write a 16-bit value into a low/high register pair, low byte first
    pub fn write_reg_pair(
        &mut self,
        low: Register,
        high: Register,
        value: u16,
    ) -> Result<(), Error<SPI::Error>> {
        let [lo, hi] = value.to_le_bytes();
        self.write_reg(low, lo)?;
        self.write_reg(high, hi)
    }

    /// Set `mask` bits in a register
    ///
    /// BFS only works on ETH registers; MAC/MII registers get a
    /// read-modify-write instead.
    pub fn set_bits(&mut self, reg: Register, mask: u8) -> Result<(), Error<SPI::Error>> {
        if reg.is_mac_mii() {
            let value = self.read_reg(reg)?;
            return self.write_reg(reg, value | mask);
        }
        self.select_bank(reg)?;
        self.bit_op(OP_BIT_FIELD_SET, reg, mask)
    }

    /// Clear `mask` bits in a register
    pub fn clear_bits(&mut self, reg: Register, mask: u8) -> Result<(), Error<SPI::Error>> {
        if reg.is_mac_mii() {
            let value = self.read_reg(reg)?;
            return self.write_reg(reg, value & !mask);
        }
        self.select_bank(reg)?;
        self.bit_op(OP_BIT_FIELD_CLEAR, reg, mask)
    }

    #[inline]
    fn bit_op(&mut self, op: u8, reg: Register, mask: u8) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[op | reg.offset(), mask])])
            .map_err(Error::Spi)
    }

    /// System reset command (SRC)
    ///
    /// The reset puts ECON1.BSEL back to bank 0, so the cache is dropped.
    pub fn soft_reset(&mut self) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[OP_SOFT_RESET])])
            .map_err(Error::Spi)?;
        self.invalidate_bank();
        Ok(())
    }

    // ========================================================================
    // Buffer Memory
    // ========================================================================

    /// Point ERDPT at `ptr`
    pub fn set_read_pointer(&mut self, ptr: u16) -> Result<(), Error<SPI::Error>> {
        self.write_reg_pair(regs::ERDPTL, regs::ERDPTH, ptr)
    }

    /// Point EWRPT at `ptr`
    pub fn set_write_pointer(&mut self, ptr: u16) -> Result<(), Error<SPI::Error>> {
        self.write_reg_pair(regs::EWRPTL, regs::EWRPTH, ptr)
    }

    /// Read `data.len()` bytes starting at ERDPT (RBM)
    pub fn read_buffer(&mut self, data: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[OP_READ_BUF_MEM]), Operation::Read(data)])
            .map_err(Error::Spi)
    }

    /// Read one byte at ERDPT
    pub fn read_buffer_byte(&mut self) -> Result<u8, Error<SPI::Error>> {
        let mut byte = [0u8; 1];
        self.read_buffer(&mut byte)?;
        Ok(byte[0])
    }

    /// Write `data` starting at EWRPT (WBM)
    pub fn write_buffer(&mut self, data: &[u8]) -> Result<(), Error<SPI::Error>> {
        self.spi
            .transaction(&mut [Operation::Write(&[OP_WRITE_BUF_MEM]), Operation::Write(data)])
            .map_err(Error::Spi)
    }

    /// Write one byte at EWRPT
    pub fn write_buffer_byte(&mut self, byte: u8) -> Result<(), Error<SPI::Error>> {
        self.write_buffer(&[byte])
    }
}
