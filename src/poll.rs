//! Bounded busy-wait polling
//!
//! Every wait in the driver goes through [`poll`], so the reference behavior
//! (spin forever) and a bounded variant share one code path. The probe runs
//! first and the delay only happens between attempts, which keeps the register
//! access order identical to a plain `while` loop.

use embedded_hal::delay::DelayNs;

use crate::error::{Error, Wait};

/// Retry policy for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Poll until the condition holds
    Forever { interval_us: u32 },
    /// Give up with [`Error::Timeout`] after `attempts` probes
    Limited { attempts: u32, interval_us: u32 },
}

impl Retry {
    pub const fn forever(interval_us: u32) -> Self {
        Retry::Forever { interval_us }
    }

    pub const fn limited(attempts: u32, interval_us: u32) -> Self {
        Retry::Limited {
            attempts,
            interval_us,
        }
    }

    fn interval_us(self) -> u32 {
        match self {
            Retry::Forever { interval_us } | Retry::Limited { interval_us, .. } => interval_us,
        }
    }
}

/// Run `probe` until it yields `Some`, sleeping `retry`'s interval in between
///
/// The probe gets the delay back so it can do its own settling waits.
pub(crate) fn poll<T, E, D, F>(
    delay: &mut D,
    retry: Retry,
    wait: Wait,
    mut probe: F,
) -> Result<T, Error<E>>
where
    D: DelayNs,
    F: FnMut(&mut D) -> Result<Option<T>, Error<E>>,
{
    let mut attempt: u32 = 0;
    loop {
        if let Some(value) = probe(delay)? {
            return Ok(value);
        }

        attempt = attempt.saturating_add(1);
        if let Retry::Limited { attempts, .. } = retry
            && attempt >= attempts
        {
            log::warn!("[ENC28J60] Gave up waiting for {} after {} attempts", wait, attempt);
            return Err(Error::Timeout(wait));
        }

        let interval = retry.interval_us();
        if interval > 0 {
            delay.delay_us(interval);
        }
    }
}
