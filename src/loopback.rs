use heapless::Deque;

use crate::{
    adapter::{AdapterSettings, ControllerAdapter},
    frame::Frame,
    CBUS_BIT_RATE,
};

/// `begin` status: a requested buffer size exceeds the adapter's storage.
pub const STATUS_CAPACITY_EXCEEDED: u16 = 1;
/// `begin` status: the requested bit rate is not the CBUS bit rate.
pub const STATUS_UNSUPPORTED_BIT_RATE: u16 = 2;

/// Software CAN controller with bounded receive and transmit buffers.
///
/// `DEPTH` is the storage available to each buffer; the capacities actually
/// used are the ones passed to `begin`. Frames queued by
/// [`try_send`](ControllerAdapter::try_send) stay in the transmit buffer
/// until the bus side takes them with [`take_transmitted`](Self::take_transmitted)
/// or echoes them back with [`loop_back`](Self::loop_back). Received frames
/// are fed with [`inject`](Self::inject).
#[derive(Debug)]
pub struct LoopbackAdapter<const DEPTH: usize> {
    rx: Deque<Frame, DEPTH>,
    tx: Deque<Frame, DEPTH>,
    settings: Option<AdapterSettings>,
    rx_errors: u16,
    tx_errors: u16,
    rx_overflows: u32,
    begin_count: u32,
    end_count: u32,
}

impl<const DEPTH: usize> Default for LoopbackAdapter<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize> LoopbackAdapter<DEPTH> {
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Deque::new(),
            settings: None,
            rx_errors: 0,
            tx_errors: 0,
            rx_overflows: 0,
            begin_count: 0,
            end_count: 0,
        }
    }

    /// Settings of the running session, `None` when stopped.
    pub fn settings(&self) -> Option<&AdapterSettings> {
        self.settings.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.settings.is_some()
    }

    /// Number of `begin` calls, successful or not.
    pub fn begin_count(&self) -> u32 {
        self.begin_count
    }

    pub fn end_count(&self) -> u32 {
        self.end_count
    }

    /// Frames dropped by [`inject`](Self::inject) because the receive buffer was full.
    pub fn rx_overflows(&self) -> u32 {
        self.rx_overflows
    }

    /// Number of frames waiting in the transmit buffer.
    pub fn pending_transmit(&self) -> usize {
        self.tx.len()
    }

    /// Overrides the error counters reported to the transport.
    pub fn set_error_counters(&mut self, rx_errors: u16, tx_errors: u16) {
        self.rx_errors = rx_errors;
        self.tx_errors = tx_errors;
    }

    /// Delivers a frame as if it had arrived from the bus. The frame is given
    /// back when the adapter is stopped or its receive buffer is full.
    pub fn inject(&mut self, frame: Frame) -> Result<(), Frame> {
        let Some(settings) = self.settings else {
            return Err(frame);
        };

        if self.rx.len() >= settings.rx_capacity as usize {
            self.rx_overflows = self.rx_overflows.saturating_add(1);
            return Err(frame);
        }

        self.rx.push_back(frame)
    }

    /// Takes the oldest frame from the transmit buffer, as the bus would.
    pub fn take_transmitted(&mut self) -> Option<Frame> {
        self.tx.pop_front()
    }

    /// Moves pending transmit frames into the receive buffer (internal
    /// loopback) until one side runs out. Returns the number of frames moved.
    pub fn loop_back(&mut self) -> usize {
        let rx_capacity = self.settings.map_or(0, |s| s.rx_capacity as usize);
        let mut moved = 0;

        while self.rx.len() < rx_capacity {
            let Some(frame) = self.tx.pop_front() else {
                break;
            };

            // rx_capacity never exceeds DEPTH, checked in `begin`.
            if self.rx.push_back(frame).is_err() {
                break;
            }

            moved += 1;
        }

        moved
    }
}

impl<const DEPTH: usize> ControllerAdapter for LoopbackAdapter<DEPTH> {
    fn begin(&mut self, settings: &AdapterSettings) -> Result<(), u16> {
        self.begin_count = self.begin_count.saturating_add(1);

        if settings.bit_rate != CBUS_BIT_RATE {
            return Err(STATUS_UNSUPPORTED_BIT_RATE);
        }

        if settings.rx_capacity as usize > DEPTH || settings.tx_capacity as usize > DEPTH {
            return Err(STATUS_CAPACITY_EXCEEDED);
        }

        self.rx.clear();
        self.tx.clear();
        self.settings = Some(*settings);

        Ok(())
    }

    fn available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive(&mut self) -> Option<Frame> {
        self.rx.pop_front()
    }

    fn try_send(&mut self, frame: &Frame) -> bool {
        let Some(settings) = self.settings else {
            return false;
        };

        if self.tx.len() >= settings.tx_capacity as usize {
            return false;
        }

        self.tx.push_back(frame.clone()).is_ok()
    }

    fn receive_error_counter(&self) -> u16 {
        self.rx_errors
    }

    fn transmit_error_counter(&self) -> u16 {
        self.tx_errors
    }

    fn end(&mut self) {
        self.end_count = self.end_count.saturating_add(1);
        self.rx.clear();
        self.tx.clear();
        self.settings = None;
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::StandardId;

    use crate::{
        AdapterSettings, ControllerAdapter, Frame, LoopbackAdapter, STATUS_CAPACITY_EXCEEDED,
        STATUS_UNSUPPORTED_BIT_RATE,
    };

    fn frame(id: u16, data: &[u8]) -> Frame {
        Frame::new_data(StandardId::new(id).unwrap(), data).unwrap()
    }

    fn settings(rx_capacity: u8, tx_capacity: u8) -> AdapterSettings {
        AdapterSettings {
            rx_capacity,
            tx_capacity,
            ..AdapterSettings::default()
        }
    }

    #[test]
    fn begin_validates_settings() {
        let mut adapter = LoopbackAdapter::<4>::new();

        assert_eq!(
            adapter.begin(&settings(5, 1)),
            Err(STATUS_CAPACITY_EXCEEDED)
        );
        assert_eq!(
            adapter.begin(&AdapterSettings {
                bit_rate: 250_000,
                ..settings(1, 1)
            }),
            Err(STATUS_UNSUPPORTED_BIT_RATE)
        );
        assert!(!adapter.is_open());

        assert_eq!(adapter.begin(&settings(4, 4)), Ok(()));
        assert!(adapter.is_open());
        assert_eq!(adapter.begin_count(), 3);
    }

    #[test]
    fn stopped_adapter_is_inert() {
        let mut adapter = LoopbackAdapter::<4>::new();

        assert!(!adapter.try_send(&frame(1, &[])));
        assert!(adapter.inject(frame(1, &[])).is_err());
        assert!(!adapter.available());
    }

    #[test]
    fn transmit_buffer_is_bounded_by_configured_capacity() {
        let mut adapter = LoopbackAdapter::<8>::new();
        adapter.begin(&settings(8, 2)).unwrap();

        assert!(adapter.try_send(&frame(1, &[1])));
        assert!(adapter.try_send(&frame(2, &[2])));
        assert!(!adapter.try_send(&frame(3, &[3])));
        assert_eq!(adapter.pending_transmit(), 2);

        assert_eq!(adapter.take_transmitted(), Some(frame(1, &[1])));
        assert!(adapter.try_send(&frame(3, &[3])));
    }

    #[test]
    fn receive_is_fifo_and_counts_overflows() {
        let mut adapter = LoopbackAdapter::<8>::new();
        adapter.begin(&settings(2, 2)).unwrap();

        assert!(adapter.inject(frame(1, &[1])).is_ok());
        assert!(adapter.inject(frame(2, &[2])).is_ok());
        assert_eq!(adapter.inject(frame(3, &[3])), Err(frame(3, &[3])));
        assert_eq!(adapter.rx_overflows(), 1);

        assert!(adapter.available());
        assert_eq!(adapter.receive(), Some(frame(1, &[1])));
        assert_eq!(adapter.receive(), Some(frame(2, &[2])));
        assert_eq!(adapter.receive(), None);
        assert!(!adapter.available());
    }

    #[test]
    fn loop_back_stops_when_receive_side_is_full() {
        let mut adapter = LoopbackAdapter::<4>::new();
        adapter.begin(&settings(1, 3)).unwrap();

        assert!(adapter.try_send(&frame(1, &[])));
        assert!(adapter.try_send(&frame(2, &[])));

        assert_eq!(adapter.loop_back(), 1);
        assert_eq!(adapter.pending_transmit(), 1);
        assert_eq!(adapter.rx_overflows(), 0);
        assert_eq!(adapter.receive(), Some(frame(1, &[])));

        assert_eq!(adapter.loop_back(), 1);
        assert_eq!(adapter.receive(), Some(frame(2, &[])));
    }

    #[test]
    fn end_discards_buffers() {
        let mut adapter = LoopbackAdapter::<4>::new();
        adapter.begin(&settings(4, 4)).unwrap();
        adapter.set_error_counters(3, 7);

        assert!(adapter.try_send(&frame(1, &[])));
        assert!(adapter.inject(frame(2, &[])).is_ok());

        adapter.end();

        assert!(!adapter.is_open());
        assert_eq!(adapter.end_count(), 1);
        assert_eq!(adapter.pending_transmit(), 0);
        assert!(!adapter.available());
        assert_eq!(adapter.receive_error_counter(), 3);
        assert_eq!(adapter.transmit_error_counter(), 7);
    }
}
