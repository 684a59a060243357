//! ENC28J60 Ethernet Controller Driver
//!
//! Polled driver for the Microchip ENC28J60 10BASE-T controller attached over
//! SPI. The driver owns the controller's 8 KB packet buffer: a receive ring at
//! the bottom, one transmit slot at the top.
//!
//! # Layers
//!
//! - [`regs`]: register map, opcodes and bit definitions
//! - [`bus`]: banked register access and buffer memory over `SpiDevice`
//! - [`layout`]: buffer partitioning and ring pointer arithmetic
//! - [`phy`]: MII management and link state
//! - [`filter`]: receive filters (unicast, CRC, ARP broadcast pattern match)
//! - [`driver`]: [`Enc28j60`] bring-up, receive and transmit
//! - [`netdev`] / [`stack`]: the frame interface and its smoltcp adapter
//!
//! # Example
//!
//! ```ignore
//! use enc28j60::{Config, Enc28j60, MacAddress, SmoltcpDevice};
//!
//! let mac = MacAddress::new([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]);
//! let netdev = spin::Mutex::new(Enc28j60::new(spi, delay, Config::new(mac))?);
//! let mut device = SmoltcpDevice::new(&netdev);
//! ```
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod layout;
pub mod mac;
pub mod monitor;
pub mod netdev;
pub mod phy;
pub mod poll;
pub mod regs;
pub mod stack;
pub mod status;

#[cfg(test)]
mod sim;

pub use config::Config;
pub use driver::{Enc28j60, MAX_TX_FRAME_LEN, SiliconRevision};
pub use error::{Error, TxFailure, Wait};
pub use mac::MacAddress;
pub use monitor::{LogMonitor, Monitor, RxEvent, RxVerdict, TxEvent};
pub use netdev::NetworkDevice;
pub use phy::LinkState;
pub use poll::Retry;
pub use stack::SmoltcpDevice;
pub use status::{RxFlags, RxStatus, TxFlags, TxStatus};
