//! Receive and transmit status vectors
//!
//! The controller writes a fixed-layout little-endian record next to every
//! frame. The layouts are decoded bit by bit here rather than through a
//! packed struct, so the field positions are exactly the ones in the
//! datasheet tables.
//!
//! # Receive status vector (DS39662E table 7-3, 4 bytes)
//!
//! | Bits  | Field                          |
//! |-------|--------------------------------|
//! | 15-0  | received byte count            |
//! | 31-16 | [`RxFlags`] (bit 16 = flag 0)  |
//!
//! # Transmit status vector (DS39662E table 7-1, 7 bytes)
//!
//! | Bits  | Field                               |
//! |-------|-------------------------------------|
//! | 15-0  | transmit byte count                 |
//! | 19-16 | collision count                     |
//! | 31-20 | [`TxFlags`] bits 0-11               |
//! | 47-32 | total bytes transmitted on the wire |
//! | 51-48 | [`TxFlags`] bits 12-15              |
//! | 55-52 | zero                                |

use bitflags::bitflags;

/// Receive status vector length in bytes
pub const RX_STATUS_LEN: usize = 4;

/// Transmit status vector length in bytes
pub const TX_STATUS_LEN: usize = 7;

bitflags! {
    /// Receive status bits 31-16
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RxFlags: u16 {
        const LONG_EVENT_DROP = 1 << 0;
        const CARRIER_EVENT = 1 << 2;
        const CRC_ERROR = 1 << 4;
        const LENGTH_CHECK_ERROR = 1 << 5;
        const LENGTH_OUT_OF_RANGE = 1 << 6;
        const RECEIVED_OK = 1 << 7;
        const MULTICAST = 1 << 8;
        const BROADCAST = 1 << 9;
        const DRIBBLE_NIBBLE = 1 << 10;
        const CONTROL_FRAME = 1 << 11;
        const PAUSE_CONTROL_FRAME = 1 << 12;
        const UNKNOWN_OPCODE = 1 << 13;
        const VLAN = 1 << 14;
    }
}

bitflags! {
    /// Transmit status flag bits, packed from vector bits 20-31 and 48-51
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxFlags: u16 {
        const CRC_ERROR = 1 << 0;
        const LENGTH_CHECK_ERROR = 1 << 1;
        const LENGTH_OUT_OF_RANGE = 1 << 2;
        const DONE = 1 << 3;
        const MULTICAST = 1 << 4;
        const BROADCAST = 1 << 5;
        const PACKET_DEFER = 1 << 6;
        const EXCESSIVE_DEFER = 1 << 7;
        const EXCESSIVE_COLLISION = 1 << 8;
        const LATE_COLLISION = 1 << 9;
        const GIANT = 1 << 10;
        const UNDERRUN = 1 << 11;
        const CONTROL_FRAME = 1 << 12;
        const PAUSE_CONTROL_FRAME = 1 << 13;
        const BACKPRESSURE = 1 << 14;
        const VLAN = 1 << 15;
    }
}

/// Decoded receive status vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxStatus {
    pub byte_count: u16,
    pub flags: RxFlags,
}

impl RxStatus {
    pub fn from_bytes(raw: [u8; RX_STATUS_LEN]) -> Self {
        Self {
            byte_count: u16::from_le_bytes([raw[0], raw[1]]),
            // Reserved bits are kept so a re-encode is bit exact
            flags: RxFlags::from_bits_retain(u16::from_le_bytes([raw[2], raw[3]])),
        }
    }

    pub fn to_bytes(&self) -> [u8; RX_STATUS_LEN] {
        let [c0, c1] = self.byte_count.to_le_bytes();
        let [f0, f1] = self.flags.bits().to_le_bytes();
        [c0, c1, f0, f1]
    }

    pub fn received_ok(&self) -> bool {
        self.flags.contains(RxFlags::RECEIVED_OK)
    }

    pub fn crc_error(&self) -> bool {
        self.flags.contains(RxFlags::CRC_ERROR)
    }

    pub fn length_check_error(&self) -> bool {
        self.flags.contains(RxFlags::LENGTH_CHECK_ERROR)
    }

    /// Received OK with neither a CRC nor a length-check error
    pub fn is_intact(&self) -> bool {
        self.received_ok() && !self.crc_error() && !self.length_check_error()
    }
}

/// Decoded transmit status vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxStatus {
    pub byte_count: u16,
    /// Collisions seen while sending (4 bits)
    pub collision_count: u8,
    pub total_bytes_on_wire: u16,
    pub flags: TxFlags,
}

impl TxStatus {
    pub fn from_bytes(raw: [u8; TX_STATUS_LEN]) -> Self {
        let low = (raw[2] >> 4) as u16;
        let mid = (raw[3] as u16) << 4;
        let high = ((raw[6] & 0x0F) as u16) << 12;

        Self {
            byte_count: u16::from_le_bytes([raw[0], raw[1]]),
            collision_count: raw[2] & 0x0F,
            total_bytes_on_wire: u16::from_le_bytes([raw[4], raw[5]]),
            flags: TxFlags::from_bits_retain(low | mid | high),
        }
    }

    pub fn to_bytes(&self) -> [u8; TX_STATUS_LEN] {
        let [c0, c1] = self.byte_count.to_le_bytes();
        let [w0, w1] = self.total_bytes_on_wire.to_le_bytes();
        let flags = self.flags.bits();

        [
            c0,
            c1,
            (self.collision_count & 0x0F) | (((flags & 0x0F) as u8) << 4),
            (flags >> 4) as u8,
            w0,
            w1,
            ((flags >> 12) & 0x0F) as u8,
        ]
    }

    pub fn done(&self) -> bool {
        self.flags.contains(TxFlags::DONE)
    }
}
