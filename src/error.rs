//! Driver errors

use core::fmt;

/// Polling loop that ran out of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// MISTAT.BUSY never cleared after an MII read or write
    MiiBusy,
    /// ECON1.TXRTS never cleared after a transmit request
    TransmitRequest,
    /// The transmit status vector never reported done
    TransmitStatus,
    /// EREVID never returned a known silicon revision
    Revision,
    /// The PHY never reported link up
    Link,
}

impl fmt::Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wait::MiiBusy => write!(f, "MII busy"),
            Wait::TransmitRequest => write!(f, "transmit request"),
            Wait::TransmitStatus => write!(f, "transmit status"),
            Wait::Revision => write!(f, "silicon revision"),
            Wait::Link => write!(f, "link up"),
        }
    }
}

/// Hardware-flagged transmit failure (ESTAT after TXIF)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxFailure {
    pub aborted: bool,
    pub late_collision: bool,
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.aborted, self.late_collision) {
            (true, true) => write!(f, "aborted after late collision"),
            (true, false) => write!(f, "aborted"),
            (false, true) => write!(f, "late collision"),
            (false, false) => write!(f, "failed"),
        }
    }
}

/// Errors that can occur while driving the controller
///
/// `E` is the error type of the underlying SPI device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// SPI transaction failed
    Spi(E),

    /// A bounded polling loop gave up
    Timeout(Wait),

    /// Transmit called with an empty frame
    FrameEmpty,

    /// Frame does not fit in the transmit window
    FrameTooLarge { len: usize, max: usize },

    /// The controller aborted the transmission
    TransmitFailed(TxFailure),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(e) => write!(f, "SPI error: {:?}", e),
            Error::Timeout(wait) => write!(f, "Timeout waiting for {}", wait),
            Error::FrameEmpty => write!(f, "Frame is empty"),
            Error::FrameTooLarge { len, max } => {
                write!(f, "Frame too large ({} bytes, max {})", len, max)
            }
            Error::TransmitFailed(failure) => write!(f, "Transmit {}", failure),
        }
    }
}
