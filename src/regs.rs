//! ENC28J60 register map
//!
//! Control registers are addressed with a one-byte *compact register address*:
//!
//! ```text
//!   bit 7     MAC/MII flag (read returns a dummy byte first)
//!   bit 6-5   bank (0..=3)
//!   bit 4-0   offset within the bank
//! ```
//!
//! Offsets 0x1B..=0x1F (EIE, EIR, ESTAT, ECON2, ECON1) are mapped into every
//! bank and never require a bank switch.
//!
//! Only the registers this driver touches are listed here.
//!
//! # References
//!
//! - ENC28J60 Data Sheet (DS39662E), sections 3 and 4
//! - ENC28J60 Silicon Errata (DS80349C)

// ============================================================================
// Compact Register Address
// ============================================================================

const MAC_MII_FLAG: u8 = 1 << 7;
const BANK_SHIFT: u8 = 5;
const BANK_MASK: u8 = 0b11;
const OFFSET_MASK: u8 = 0b1_1111;

/// First offset of the bank-independent register window (EIE)
const COMMON_FIRST: u8 = 0x1B;
/// Last offset of the bank-independent register window (ECON1)
const COMMON_LAST: u8 = 0x1F;

/// Register bank selected through ECON1.BSEL1:BSEL0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Bank0 = 0,
    Bank1 = 1,
    Bank2 = 2,
    Bank3 = 3,
}

impl Bank {
    const fn from_bits(bits: u8) -> Self {
        match bits & BANK_MASK {
            0 => Bank::Bank0,
            1 => Bank::Bank1,
            2 => Bank::Bank2,
            _ => Bank::Bank3,
        }
    }

    /// ECON1 bank-select bits for this bank
    pub const fn bsel_bits(self) -> u8 {
        self as u8
    }
}

/// Compact register address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register(u8);

impl Register {
    /// ETH register in `bank` at `offset`
    const fn eth(bank: Bank, offset: u8) -> Self {
        Self(((bank as u8) << BANK_SHIFT) | (offset & OFFSET_MASK))
    }

    /// MAC or MII register in `bank` at `offset`
    const fn mac_mii(bank: Bank, offset: u8) -> Self {
        Self(MAC_MII_FLAG | ((bank as u8) << BANK_SHIFT) | (offset & OFFSET_MASK))
    }

    /// Decode a raw compact register address
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn bank(self) -> Bank {
        Bank::from_bits(self.0 >> BANK_SHIFT)
    }

    /// 5-bit offset OR-ed into the SPI opcode
    pub const fn offset(self) -> u8 {
        self.0 & OFFSET_MASK
    }

    /// MAC/MII registers shift out a dummy byte before the data on reads
    pub const fn is_mac_mii(self) -> bool {
        self.0 & MAC_MII_FLAG != 0
    }

    /// Registers mapped into every bank
    pub const fn is_common(self) -> bool {
        let offset = self.offset();
        offset >= COMMON_FIRST && offset <= COMMON_LAST
    }
}

// ============================================================================
// SPI Instruction Set (DS39662E table 4-1)
// ============================================================================

pub const OP_READ_CTRL_REG: u8 = 0b0000_0000;
pub const OP_READ_BUF_MEM: u8 = 0b0011_1010;
pub const OP_WRITE_CTRL_REG: u8 = 0b0100_0000;
pub const OP_WRITE_BUF_MEM: u8 = 0b0111_1010;
pub const OP_BIT_FIELD_SET: u8 = 0b1000_0000;
pub const OP_BIT_FIELD_CLEAR: u8 = 0b1010_0000;
pub const OP_SOFT_RESET: u8 = 0b1111_1111;

// ============================================================================
// Common Registers (all banks)
// ============================================================================

pub const EIE: Register = Register::eth(Bank::Bank0, 0x1B);
pub const EIR: Register = Register::eth(Bank::Bank0, 0x1C);
pub const ESTAT: Register = Register::eth(Bank::Bank0, 0x1D);
pub const ECON2: Register = Register::eth(Bank::Bank0, 0x1E);
pub const ECON1: Register = Register::eth(Bank::Bank0, 0x1F);

// EIR bits
pub const EIR_PKTIF: u8 = 1 << 6;
pub const EIR_DMAIF: u8 = 1 << 5;
pub const EIR_LINKIF: u8 = 1 << 4;
pub const EIR_TXIF: u8 = 1 << 3;
pub const EIR_TXERIF: u8 = 1 << 1;
pub const EIR_RXERIF: u8 = 1 << 0;

// ESTAT bits
pub const ESTAT_LATECOL: u8 = 1 << 4;
pub const ESTAT_TXABRT: u8 = 1 << 1;
pub const ESTAT_CLKRDY: u8 = 1 << 0;

// ECON2 bits
pub const ECON2_PKTDEC: u8 = 1 << 6;

// ECON1 bits
pub const ECON1_TXRST: u8 = 1 << 7;
pub const ECON1_RXRST: u8 = 1 << 6;
pub const ECON1_TXRTS: u8 = 1 << 3;
pub const ECON1_RXEN: u8 = 1 << 2;
pub const ECON1_BSEL1: u8 = 1 << 1;
pub const ECON1_BSEL0: u8 = 1 << 0;

// ============================================================================
// Bank 0: buffer pointers
// ============================================================================

pub const ERDPTL: Register = Register::eth(Bank::Bank0, 0x00);
pub const ERDPTH: Register = Register::eth(Bank::Bank0, 0x01);
pub const EWRPTL: Register = Register::eth(Bank::Bank0, 0x02);
pub const EWRPTH: Register = Register::eth(Bank::Bank0, 0x03);
pub const ETXSTL: Register = Register::eth(Bank::Bank0, 0x04);
pub const ETXSTH: Register = Register::eth(Bank::Bank0, 0x05);
pub const ETXNDL: Register = Register::eth(Bank::Bank0, 0x06);
pub const ETXNDH: Register = Register::eth(Bank::Bank0, 0x07);
pub const ERXSTL: Register = Register::eth(Bank::Bank0, 0x08);
pub const ERXSTH: Register = Register::eth(Bank::Bank0, 0x09);
pub const ERXNDL: Register = Register::eth(Bank::Bank0, 0x0A);
pub const ERXNDH: Register = Register::eth(Bank::Bank0, 0x0B);
pub const ERXRDPTL: Register = Register::eth(Bank::Bank0, 0x0C);
pub const ERXRDPTH: Register = Register::eth(Bank::Bank0, 0x0D);

// ============================================================================
// Bank 1: receive filters, packet counter
// ============================================================================

pub const EPMM0: Register = Register::eth(Bank::Bank1, 0x08);
pub const EPMM1: Register = Register::eth(Bank::Bank1, 0x09);
pub const EPMCSL: Register = Register::eth(Bank::Bank1, 0x10);
pub const EPMCSH: Register = Register::eth(Bank::Bank1, 0x11);
pub const ERXFCON: Register = Register::eth(Bank::Bank1, 0x18);
pub const EPKTCNT: Register = Register::eth(Bank::Bank1, 0x19);

// ERXFCON bits
pub const ERXFCON_UCEN: u8 = 1 << 7;
pub const ERXFCON_CRCEN: u8 = 1 << 5;
pub const ERXFCON_PMEN: u8 = 1 << 4;

// ============================================================================
// Bank 2: MAC and MII
// ============================================================================

pub const MACON1: Register = Register::mac_mii(Bank::Bank2, 0x00);
pub const MACON3: Register = Register::mac_mii(Bank::Bank2, 0x02);
pub const MABBIPG: Register = Register::mac_mii(Bank::Bank2, 0x04);
pub const MAIPGL: Register = Register::mac_mii(Bank::Bank2, 0x06);
pub const MAIPGH: Register = Register::mac_mii(Bank::Bank2, 0x07);
pub const MAMXFLL: Register = Register::mac_mii(Bank::Bank2, 0x0A);
pub const MAMXFLH: Register = Register::mac_mii(Bank::Bank2, 0x0B);
pub const MICMD: Register = Register::mac_mii(Bank::Bank2, 0x12);
pub const MIREGADR: Register = Register::mac_mii(Bank::Bank2, 0x14);
pub const MIWRL: Register = Register::mac_mii(Bank::Bank2, 0x16);
pub const MIWRH: Register = Register::mac_mii(Bank::Bank2, 0x17);
pub const MIRDL: Register = Register::mac_mii(Bank::Bank2, 0x18);
pub const MIRDH: Register = Register::mac_mii(Bank::Bank2, 0x19);

// MACON1 bits
pub const MACON1_TXPAUS: u8 = 1 << 3;
pub const MACON1_RXPAUS: u8 = 1 << 2;
pub const MACON1_MARXEN: u8 = 1 << 0;

// MACON3 bits
pub const MACON3_PADCFG0: u8 = 1 << 5;
pub const MACON3_TXCRCEN: u8 = 1 << 4;
pub const MACON3_FRMLNEN: u8 = 1 << 1;
pub const MACON3_FULDPX: u8 = 1 << 0;

// MICMD bits
pub const MICMD_MIIRD: u8 = 1 << 0;

/// Back-to-back inter-packet gap for full duplex (DS39662E 6.5)
pub const MABBIPG_FULL_DUPLEX: u8 = 0x15;
pub const MAIPGL_DEFAULT: u8 = 0x12;
pub const MAIPGH_DEFAULT: u8 = 0x0C;

// ============================================================================
// Bank 3: MAC address, MII status, revision
// ============================================================================

pub const MAADR5: Register = Register::mac_mii(Bank::Bank3, 0x00);
pub const MAADR6: Register = Register::mac_mii(Bank::Bank3, 0x01);
pub const MAADR3: Register = Register::mac_mii(Bank::Bank3, 0x02);
pub const MAADR4: Register = Register::mac_mii(Bank::Bank3, 0x03);
pub const MAADR1: Register = Register::mac_mii(Bank::Bank3, 0x04);
pub const MAADR2: Register = Register::mac_mii(Bank::Bank3, 0x05);
// MISTAT is an MII register: it needs the dummy byte like the rest of MI*
pub const MISTAT: Register = Register::mac_mii(Bank::Bank3, 0x0A);
pub const EREVID: Register = Register::eth(Bank::Bank3, 0x12);

/// MAC address registers in wire order (first octet first)
pub const MAADR: [Register; 6] = [MAADR1, MAADR2, MAADR3, MAADR4, MAADR5, MAADR6];

// MISTAT bits
pub const MISTAT_BUSY: u8 = 1 << 0;

/// EREVID carries the silicon revision in its low five bits
pub const EREVID_MASK: u8 = 0b1_1111;

// ============================================================================
// PHY registers (indirect, through MII)
// ============================================================================

pub const PHCON1: u8 = 0x00;
pub const PHSTAT1: u8 = 0x01;
pub const PHCON2: u8 = 0x10;
pub const PHSTAT2: u8 = 0x11;
pub const PHIR: u8 = 0x13;

// PHCON1 bits
pub const PHCON1_PDPXMD: u16 = 1 << 8;

// PHSTAT1 bits
pub const PHSTAT1_LLSTAT: u16 = 1 << 2;

// PHCON2 bits
pub const PHCON2_HDLDIS: u16 = 1 << 8;

// PHSTAT2 bits
pub const PHSTAT2_LSTAT: u16 = 1 << 10;

// PHIR bits
pub const PHIR_PLNKIF: u16 = 1 << 4;
