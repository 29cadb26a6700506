use embedded_can::Id;

use crate::{
    adapter::{AdapterSettings, ControllerAdapter, PortRegistry},
    frame::Frame,
    header::{Header, NodeId, Priority},
    stats::{Statistics, StatusSnapshot},
    CBUS_BIT_RATE, DEFAULT_PORT, DEFAULT_RX_BUFFERS, DEFAULT_TX_BUFFERS,
};

/// Per-frame transmit options. The defaults are priority `(2, 3)`, a data
/// frame and a standard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendOptions {
    pub priority: Priority,
    /// Send as a remote transmission request
    pub remote: bool,
    /// Carry the 11-bit header in an extended (29-bit) identifier
    pub extended: bool,
}

impl SendOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }
}

/// Configuration applied by the next `begin` (buffer sizes) or `send`
/// (node id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportConfig {
    pub rx_buffers: u8,
    pub tx_buffers: u8,
    /// Node id stamped into the header of every outbound frame
    pub node_id: NodeId,
    /// Poll mode requested by the last `begin`, reused by `reset`
    pub poll: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rx_buffers: DEFAULT_RX_BUFFERS,
            tx_buffers: DEFAULT_TX_BUFFERS,
            node_id: NodeId::MIN,
            poll: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum LinkState {
    Idle,
    Active,
}

/// CBUS transport over one of several CAN controllers.
///
/// The transport starts bound to port 1 and idle. [`begin`](Self::begin)
/// starts the bound controller; frames can then be polled with
/// [`available`](Self::available) / [`receive_next`](Self::receive_next) and
/// queued with [`send`](Self::send). Nothing blocks and nothing is retried.
///
/// ```
/// use cbusx::{CbusTransport, LoopbackAdapter, PortRegistry, SendOptions};
/// use embedded_can::StandardId;
///
/// let mut transport = CbusTransport::new(PortRegistry::<_, 1>::new(LoopbackAdapter::<32>::new()));
/// transport.begin(false).unwrap();
///
/// let frame = cbusx::Frame::new_data(StandardId::ZERO, &[0x90, 0x01, 0x00, 0x00, 0x05]).unwrap();
/// transport.send(&frame, SendOptions::default()).unwrap();
///
/// transport.adapter_mut().loop_back();
/// while let Some(frame) = transport.receive_next() {
///     assert_eq!(frame.data(), Some(&[0x90, 0x01, 0x00, 0x00, 0x05][..]));
/// }
/// ```
#[derive(Debug)]
pub struct CbusTransport<A, const N: usize> {
    ports: PortRegistry<A, N>,
    port: u8,
    config: TransportConfig,
    state: LinkState,
    stats: Statistics,
}

impl<A: ControllerAdapter, const N: usize> CbusTransport<A, N> {
    pub fn new(ports: PortRegistry<A, N>) -> Self {
        Self {
            ports,
            port: DEFAULT_PORT,
            config: TransportConfig::default(),
            state: LinkState::Idle,
            stats: Statistics::default(),
        }
    }

    /// Starts the bound controller at the CBUS bit rate with the configured
    /// buffer sizes and clears the counters.
    ///
    /// On failure the transport stays idle, the counters are left as they
    /// were and nothing is retried.
    pub fn begin(&mut self, poll: bool) -> Result<(), InitError> {
        if self.state == LinkState::Active {
            self.adapter_mut().end();
            self.state = LinkState::Idle;
        }

        self.config.poll = poll;

        let settings = AdapterSettings {
            bit_rate: CBUS_BIT_RATE,
            rx_capacity: self.config.rx_buffers,
            tx_capacity: self.config.tx_buffers,
            poll,
        };

        let port = self.port;
        if let Err(status) = self.adapter_mut().begin(&settings) {
            log::error!(
                "error initialising CAN{} controller, error code = {}",
                port,
                status
            );
            return Err(InitError { port, status });
        }

        log::debug!(
            "CAN{} controller initialised ok ({} rx / {} tx buffers)",
            port,
            settings.rx_capacity,
            settings.tx_capacity
        );

        self.stats.clear();
        self.state = LinkState::Active;

        Ok(())
    }

    /// Whether an inbound frame is waiting. Always false while idle.
    pub fn available(&self) -> bool {
        self.is_active() && self.adapter().available()
    }

    /// Pops the oldest inbound frame and counts it. Returns `None` without
    /// counting when nothing is queued or the transport is idle.
    pub fn receive_next(&mut self) -> Option<Frame> {
        if !self.is_active() {
            return None;
        }

        let frame = self.adapter_mut().receive()?;
        self.stats.record_received();

        Some(frame)
    }

    /// Stamps the CBUS header (priority from `options`, node id from the
    /// configuration) onto `frame` and hands it to the controller once.
    /// The RTR flag is taken from `options.remote`, whatever `frame` carries.
    ///
    /// A full transmit buffer drops the frame and returns
    /// [`SendError::Rejected`]; only accepted frames are counted.
    pub fn send(&mut self, frame: &Frame, options: SendOptions) -> Result<(), SendError> {
        if !self.is_active() {
            return Err(SendError::NotStarted);
        }

        let header = Header::new(options.priority, self.config.node_id);
        let id = if options.extended {
            Id::Extended(header.extended_id())
        } else {
            Id::Standard(header.id())
        };

        let outbound = if options.remote {
            frame.with_id(id).to_remote()
        } else {
            frame.with_id(id).to_data()
        };

        if !self.adapter_mut().try_send(&outbound) {
            log::trace!("CAN{} transmit buffer full, frame dropped", self.port);
            return Err(SendError::Rejected);
        }

        self.stats.record_sent();

        Ok(())
    }

    /// [`send`](Self::send) with [`SendOptions::default`].
    pub fn send_default(&mut self, frame: &Frame) -> Result<(), SendError> {
        self.send(frame, SendOptions::default())
    }

    /// Stops the bound controller and begins it again with the last poll
    /// mode and the current configuration. The counters start from zero.
    pub fn reset(&mut self) -> Result<(), InitError> {
        self.adapter_mut().end();
        self.state = LinkState::Idle;

        self.begin(self.config.poll)
    }

    /// Buffer sizes used by the next `begin`.
    pub fn set_num_buffers(&mut self, rx_buffers: u8, tx_buffers: u8) {
        self.config.rx_buffers = rx_buffers;
        self.config.tx_buffers = tx_buffers;
    }

    pub fn set_node_id(&mut self, node_id: NodeId) {
        self.config.node_id = node_id;
    }

    /// Binds another controller. An unknown ordinal falls back to port 1
    /// and the returned warning is also logged.
    ///
    /// The previous controller is stopped if it was running; the transport
    /// is idle until the next `begin`.
    pub fn set_port(&mut self, port: u8) -> Option<PortSelectionWarning> {
        if self.state == LinkState::Active {
            self.adapter_mut().end();
            self.state = LinkState::Idle;
        }

        if self.ports.contains(port) {
            log::debug!("bound to CAN{}", port);
            self.port = port;
            return None;
        }

        let warning = PortSelectionWarning { requested: port };
        log::warn!("{}", warning);
        self.port = DEFAULT_PORT;

        Some(warning)
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let adapter = self.adapter();

        self.stats.snapshot(
            adapter.receive_error_counter(),
            adapter.transmit_error_counter(),
        )
    }

    /// Logs the status line at info level.
    pub fn log_status(&self) {
        log::info!("{}", self.status_snapshot());
    }

    /// Ordinal of the bound controller.
    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn is_active(&self) -> bool {
        self.state == LinkState::Active
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// The bound controller.
    pub fn adapter(&self) -> &A {
        self.ports
            .get(self.port)
            .expect("the bound port is always registered")
    }

    /// The bound controller, for driver-specific calls.
    pub fn adapter_mut(&mut self) -> &mut A {
        self.ports
            .get_mut(self.port)
            .expect("the bound port is always registered")
    }

    pub fn ports(&self) -> &PortRegistry<A, N> {
        &self.ports
    }

    /// Gives the controllers back.
    pub fn into_ports(self) -> PortRegistry<A, N> {
        self.ports
    }
}

/// A controller refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("CAN{port} controller failed to start (status {status})")]
pub struct InitError {
    pub port: u8,
    pub status: u16,
}

/// `set_port` was given an ordinal with no registered controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("CAN{requested} does not exist, defaulting to CAN1")]
pub struct PortSelectionWarning {
    pub requested: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    #[error("Transmit buffer is full, frame dropped")]
    Rejected,
    #[error("Transport has not been started")]
    NotStarted,
}
