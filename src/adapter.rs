use heapless::Vec;

use crate::{frame::Frame, CBUS_BIT_RATE, DEFAULT_RX_BUFFERS, DEFAULT_TX_BUFFERS};

/// Parameters handed to a controller when a transport session begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterSettings {
    /// Nominal bit rate in bit/s. Always [`CBUS_BIT_RATE`] when issued by
    /// the transport.
    pub bit_rate: u32,
    /// Number of receive buffer slots
    pub rx_capacity: u8,
    /// Number of transmit buffer slots
    pub tx_capacity: u8,
    /// Whether the caller polls the controller instead of relying on an
    /// interrupt to fill the receive buffer
    pub poll: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            bit_rate: CBUS_BIT_RATE,
            rx_capacity: DEFAULT_RX_BUFFERS,
            tx_capacity: DEFAULT_TX_BUFFERS,
            poll: false,
        }
    }
}

/// Capabilities a CAN controller driver exposes to the CBUS transport.
///
/// Implementations may be a real transceiver, a simulator or a software
/// loopback (see [`LoopbackAdapter`](crate::LoopbackAdapter)). None of the
/// methods may block.
///
/// A controller that fills its receive buffer from an interrupt must make
/// that buffer safe for one producer (the interrupt) and one consumer
/// ([`receive`](Self::receive)), either with a lock-free ring or by masking
/// the interrupt while a frame is popped.
pub trait ControllerAdapter {
    /// Starts the controller. `Err` carries the driver's non-zero status code.
    fn begin(&mut self, settings: &AdapterSettings) -> Result<(), u16>;

    /// Whether at least one received frame is queued.
    fn available(&self) -> bool;

    /// Pops the oldest received frame.
    fn receive(&mut self) -> Option<Frame>;

    /// Queues a frame for transmission. Returns `false` when the transmit
    /// buffer is full, in which case the frame is dropped.
    fn try_send(&mut self, frame: &Frame) -> bool;

    /// Receive error counter (REC) as reported by the controller.
    fn receive_error_counter(&self) -> u16;

    /// Transmit error counter (TEC) as reported by the controller.
    fn transmit_error_counter(&self) -> u16;

    /// Stops the controller and discards its buffers.
    fn end(&mut self);
}

/// Ordered set of controllers addressed by 1-based port ordinals.
///
/// Port 1 always exists: the registry is built from its first adapter.
#[derive(Debug)]
pub struct PortRegistry<A, const N: usize> {
    ports: Vec<A, N>,
}

impl<A, const N: usize> PortRegistry<A, N> {
    /// Creates a registry with `first` bound to port 1.
    ///
    /// `N` must be in `1..=255` so every slot has a `u8` ordinal; other
    /// capacities fail to build.
    pub fn new(first: A) -> Self {
        const {
            assert!(
                N >= 1 && N <= u8::MAX as usize,
                "port registry capacity must be 1..=255"
            )
        };

        let mut ports = Vec::new();
        // N >= 1, so the first push always fits.
        let _ = ports.push(first);

        Self { ports }
    }

    /// Appends an adapter and returns its port ordinal, or gives the adapter
    /// back when the registry is full.
    pub fn register(&mut self, adapter: A) -> Result<u8, A> {
        self.ports.push(adapter)?;

        // len() <= N <= 255, checked in `new`.
        Ok(self.ports.len() as u8)
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, adapter: A) -> Result<Self, A> {
        self.register(adapter)?;

        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn contains(&self, port: u8) -> bool {
        port >= 1 && (port as usize) <= self.ports.len()
    }

    pub fn get(&self, port: u8) -> Option<&A> {
        self.index(port).and_then(|index| self.ports.get(index))
    }

    pub fn get_mut(&mut self, port: u8) -> Option<&mut A> {
        self.index(port).and_then(|index| self.ports.get_mut(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.ports.iter()
    }

    fn index(&self, port: u8) -> Option<usize> {
        self.contains(port).then(|| port as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::PortRegistry;

    #[test]
    fn ordinals_start_at_one() {
        let mut registry = PortRegistry::<&str, 3>::new("can1");

        assert_eq!(registry.register("can2"), Ok(2));
        assert_eq!(registry.register("can3"), Ok(3));
        assert_eq!(registry.register("can4"), Err("can4"));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(0), None);
        assert_eq!(registry.get(1), Some(&"can1"));
        assert_eq!(registry.get(3), Some(&"can3"));
        assert_eq!(registry.get(4), None);
        assert!(!registry.contains(7));
    }

    #[test]
    fn builder_style_registration() {
        let registry = PortRegistry::<u8, 2>::new(10).with(20).unwrap();

        assert_eq!(registry.iter().copied().sum::<u8>(), 30);
        assert!(registry.with(30).is_err());
    }

    #[test]
    fn largest_registry_reaches_last_ordinal() {
        let mut registry = PortRegistry::<u8, 255>::new(0);

        for value in 1..=254u8 {
            assert_eq!(registry.register(value), Ok(value + 1));
        }

        assert_eq!(registry.len(), 255);
        assert!(registry.contains(255));
        assert_eq!(registry.get(255), Some(&254));
        assert_eq!(registry.register(255), Err(255));
    }
}
