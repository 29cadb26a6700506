use core::fmt;

/// Frame counters for one transport session.
///
/// Only the transport clears them, when a `begin` succeeds, so their
/// lifetime matches the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Statistics {
    sent: u32,
    received: u32,
}

impl Statistics {
    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub(crate) fn record_sent(&mut self) {
        self.sent = self.sent.saturating_add(1);
    }

    pub(crate) fn record_received(&mut self) {
        self.received = self.received.saturating_add(1);
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Combines the counters with the error counters reported by a controller.
    pub fn snapshot(&self, rx_errors: u16, tx_errors: u16) -> StatusSnapshot {
        StatusSnapshot {
            sent: self.sent,
            received: self.received,
            rx_errors,
            tx_errors,
        }
    }
}

/// Point-in-time view of the transport counters.
///
/// The `Display` output is the fixed status line consumed by log scrapers:
///
/// ```text
/// CBUS status: messages received = 2, sent = 3, receive errors = 0, transmit errors = 1
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub sent: u32,
    pub received: u32,
    pub rx_errors: u16,
    pub tx_errors: u16,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CBUS status: messages received = {}, sent = {}, receive errors = {}, transmit errors = {}",
            self.received, self.sent, self.rx_errors, self.tx_errors
        )
    }
}
