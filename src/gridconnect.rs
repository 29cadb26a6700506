//! GridConnect, the ASCII framing spoken by CBUS USB, serial and TCP gateways.
//!
//! ```text
//! :S B020 N 9101000000 ;     standard data frame, id 0x581
//! :X 00080004 R ;            extended remote frame, id 0x4
//! :S B020 R 3 ;              standard remote frame, id 0x581, DLC 3
//! ```
//!
//! The identifier is written the way an MCP2515 lays out its id registers:
//! a standard id is shifted left by 5 into four hex digits, an extended id
//! splits into an 11-bit SID (bits 31..21), the EXIDE flag (bit 19) and an
//! 18-bit EID (bits 17..0) over eight hex digits. Remote frames carry no
//! payload; a non-zero DLC follows the `R` as a single digit, and a bare `R`
//! decodes with a DLC of 0.

use embedded_can::{ExtendedId, Id, StandardId};
use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    frame::{Frame, FrameError},
    MAX_DATA_LENGTH,
};

const START: u8 = b':';
const END: u8 = b';';

const STANDARD_ID_DIGITS: usize = 4;
const EXTENDED_ID_DIGITS: usize = 8;

const STANDARD_ID_SHIFT: u32 = 5;
const EXTENDED_SID_SHIFT: u32 = 21;
const EXTENDED_EID_BITS: u32 = 18;
const EXTENDED_EID_MASK: u32 = (1 << EXTENDED_EID_BITS) - 1;
const EXIDE_FLAG: u32 = 1 << 19;

/// Longest possible message: start, kind, 8 id digits, format, 16 data
/// digits, end.
pub const MAX_GRIDCONNECT_LEN: usize = 1 + 1 + EXTENDED_ID_DIGITS + 1 + 2 * MAX_DATA_LENGTH + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = GridConnectError, constructor = GridConnectError::InvalidIdKind))]
#[repr(u8)]
pub enum IdKind {
    Standard = b'S',
    Extended = b'X',
}

impl IdKind {
    const fn id_digits(&self) -> usize {
        match self {
            Self::Standard => STANDARD_ID_DIGITS,
            Self::Extended => EXTENDED_ID_DIGITS,
        }
    }
}

pub trait IdExt {
    fn kind(self) -> IdKind;
}

impl IdExt for Id {
    fn kind(self) -> IdKind {
        match self {
            Id::Standard(_) => IdKind::Standard,
            Id::Extended(_) => IdKind::Extended,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = GridConnectError, constructor = GridConnectError::InvalidFrameFormat))]
#[repr(u8)]
pub enum FrameFormat {
    Normal = b'N',
    Remote = b'R',
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GridConnectError {
    #[error("Message does not start with ':'")]
    MissingStart,
    #[error("Message does not end with ';'")]
    MissingEnd,
    #[error("Message is too short ({0:?} bytes) to hold an id and a format")]
    Truncated(usize),
    #[error("Tried to decode ID kind but it was invalid ({0:?})")]
    InvalidIdKind(u8),
    #[error("Tried to decode a hex digit but it was out of range ({0:?})")]
    IllegalHexDigit(u8),
    #[error("Decoded id ({0:?}) does not fit its id kind")]
    IdOutOfRange(u32),
    #[error("Tried to decode frame format but it was invalid ({0:?})")]
    InvalidFrameFormat(u8),
    #[error("Received encoded data with a length ({0:?}) that was not a multiple of 2")]
    InvalidEncodedDataLength(usize),
    #[error("Received a remote frame with ({0:?}) characters after the format (at most one DLC digit)")]
    DataInRemoteFrame(usize),
    #[error("Decoded frame is malformed")]
    Malformed(#[from] FrameError),
}

impl Frame {
    /// Renders the frame as a GridConnect message, delimiters included.
    pub fn to_gridconnect(&self) -> Vec<u8, MAX_GRIDCONNECT_LEN> {
        let mut result = Vec::new();

        // Pushes below stay within MAX_GRIDCONNECT_LEN for any valid frame.
        let _ = result.push(START);
        let _ = result.push(self.id().kind().into());

        match self.id() {
            Id::Standard(id) => push_hex(
                &mut result,
                (id.as_raw() as u32) << STANDARD_ID_SHIFT,
                STANDARD_ID_DIGITS,
            ),
            Id::Extended(id) => {
                push_hex(&mut result, extended_to_registers(id), EXTENDED_ID_DIGITS)
            }
        }

        match self.data() {
            Some(data) => {
                let _ = result.push(FrameFormat::Normal.into());
                for byte in data {
                    push_hex(&mut result, *byte as u32, 2);
                }
            }
            None => {
                let _ = result.push(FrameFormat::Remote.into());
                if self.dlc() > 0 {
                    push_hex(&mut result, self.dlc() as u32, 1);
                }
            }
        }

        let _ = result.push(END);

        result
    }

    /// Parses a GridConnect message. Hex digits may be upper or lower case.
    pub fn from_gridconnect(buffer: &[u8]) -> Result<Self, GridConnectError> {
        let Some((&START, rest)) = buffer.split_first() else {
            return Err(GridConnectError::MissingStart);
        };
        let Some((&END, body)) = rest.split_last() else {
            return Err(GridConnectError::MissingEnd);
        };

        let Some((&kind, rest)) = body.split_first() else {
            return Err(GridConnectError::Truncated(buffer.len()));
        };
        let kind = IdKind::try_from(kind)?;

        if rest.len() < kind.id_digits() + 1 {
            return Err(GridConnectError::Truncated(buffer.len()));
        }

        let (id_digits, rest) = rest.split_at(kind.id_digits());
        let registers = parse_hex(id_digits)?;
        let id = match kind {
            IdKind::Standard => standard_from_registers(registers)?,
            IdKind::Extended => extended_from_registers(registers)?,
        };

        let format = FrameFormat::try_from(rest[0])?;
        let encoded_data = &rest[1..];

        Ok(match format {
            FrameFormat::Normal => Self::new_data(id, &decode_data(encoded_data)?)?,
            FrameFormat::Remote => {
                let dlc = match encoded_data {
                    [] => 0,
                    [digit] => hex_digit_to_u8(*digit)? as usize,
                    _ => return Err(GridConnectError::DataInRemoteFrame(encoded_data.len())),
                };

                Self::new_remote(id, dlc)?
            }
        })
    }
}

/* Encoding */

fn to_hex_digit(value: u32) -> u8 {
    const HEX_LUT: &[u8] = "0123456789ABCDEF".as_bytes();

    HEX_LUT[(value & 0xF) as usize]
}

fn push_hex(buf: &mut Vec<u8, MAX_GRIDCONNECT_LEN>, value: u32, digits: usize) {
    for shift in (0..digits).rev() {
        let _ = buf.push(to_hex_digit(value >> (shift * 4)));
    }
}

fn extended_to_registers(id: ExtendedId) -> u32 {
    let raw = id.as_raw();
    let sid = raw >> EXTENDED_EID_BITS;
    let eid = raw & EXTENDED_EID_MASK;

    (sid << EXTENDED_SID_SHIFT) | EXIDE_FLAG | eid
}

/* Decoding */

fn hex_digit_to_u8(byte: u8) -> Result<u8, GridConnectError> {
    Ok(match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => return Err(GridConnectError::IllegalHexDigit(byte)),
    })
}

fn parse_hex(digits: &[u8]) -> Result<u32, GridConnectError> {
    digits.iter().try_fold(0u32, |value, digit| {
        Ok((value << 4) | hex_digit_to_u8(*digit)? as u32)
    })
}

fn standard_from_registers(registers: u32) -> Result<Id, GridConnectError> {
    let raw = registers >> STANDARD_ID_SHIFT;

    u16::try_from(raw)
        .ok()
        .and_then(StandardId::new)
        .map(Id::Standard)
        .ok_or(GridConnectError::IdOutOfRange(raw))
}

fn extended_from_registers(registers: u32) -> Result<Id, GridConnectError> {
    let sid = registers >> EXTENDED_SID_SHIFT;
    let raw = (sid << EXTENDED_EID_BITS) | (registers & EXTENDED_EID_MASK);

    ExtendedId::new(raw)
        .map(Id::Extended)
        .ok_or(GridConnectError::IdOutOfRange(raw))
}

fn decode_data(hex_bytes: &[u8]) -> Result<Vec<u8, MAX_DATA_LENGTH>, GridConnectError> {
    // Make sure data is multiple of 2 (otherwise we can't parse the hex digits)
    if hex_bytes.len() % 2 != 0 {
        return Err(GridConnectError::InvalidEncodedDataLength(hex_bytes.len()));
    }

    let length = hex_bytes.len() / 2;
    if length > MAX_DATA_LENGTH {
        return Err(FrameError::MalformedFrame(length).into());
    }

    let mut buf = Vec::new();

    for pair in hex_bytes.chunks(2) {
        let byte = (hex_digit_to_u8(pair[0])? << 4) | hex_digit_to_u8(pair[1])?;
        let _ = buf.push(byte);
    }

    Ok(buf)
}
