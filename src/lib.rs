//! Hardware-independent CBUS transport over CAN.
//!
//! CBUS packs a two-level priority and the sender's 7-bit node id into the
//! 11-bit CAN arbitration id ([`encode_header`] / [`decode_header`]).
//! [`CbusTransport`] drives one of several [`ControllerAdapter`]s held in a
//! [`PortRegistry`], buffers nothing itself and never blocks: the caller
//! polls [`CbusTransport::available`] and pulls frames with
//! [`CbusTransport::receive_next`].
#![no_std]

mod adapter;
mod frame;
mod gridconnect;
mod header;
mod loopback;
mod stats;
mod transport;

/// Bit rate of every CBUS segment.
pub const CBUS_BIT_RATE: u32 = 125_000;

/// Receive buffer slots requested when none are configured.
pub const DEFAULT_RX_BUFFERS: u8 = 32;
/// Transmit buffer slots requested when none are configured.
pub const DEFAULT_TX_BUFFERS: u8 = 16;

/// Port a transport binds to on construction and on an invalid selection.
pub const DEFAULT_PORT: u8 = 1;

/// Longest payload of a classic CAN frame.
pub const MAX_DATA_LENGTH: usize = 8;

pub use adapter::*;
pub use frame::*;
pub use gridconnect::*;
pub use header::*;
pub use loopback::*;
pub use stats::*;
pub use transport::*;

pub use embedded_can::{ExtendedId, Id, StandardId};
