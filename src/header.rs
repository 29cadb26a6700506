use embedded_can::{ExtendedId, StandardId};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/* Header layout (11 bits, MSB first): MM PP NNNNNNN */

const MAJOR_SHIFT: u16 = 9;
const MINOR_SHIFT: u16 = 7;
const PRIORITY_MASK: u16 = 0x3;
const NODE_ID_MASK: u16 = 0x7F;

/// First priority field of a CBUS header. Lower values win arbitration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = HeaderError, constructor = HeaderError::InvalidPriority))]
#[repr(u8)]
pub enum MajorPriority {
    High = 0,
    AboveNormal = 1,
    Normal = 2,
    Low = 3,
}

/// Second priority field of a CBUS header, compared only when the major
/// priorities are equal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = HeaderError, constructor = HeaderError::InvalidPriority))]
#[repr(u8)]
pub enum MinorPriority {
    High = 0,
    AboveNormal = 1,
    Normal = 2,
    Low = 3,
}

/// Combined CBUS priority. Ordering is lexicographic on `(major, minor)`,
/// which matches the arbitration order of the encoded identifiers.
///
/// The default is `(Normal, Low)`, i.e. `(2, 3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority {
    pub major: MajorPriority,
    pub minor: MinorPriority,
}

impl Priority {
    pub const fn new(major: MajorPriority, minor: MinorPriority) -> Self {
        Self { major, minor }
    }

    /// Builds a priority from raw 2-bit values, rejecting anything above 3.
    pub fn from_raw(major: u8, minor: u8) -> Result<Self, HeaderError> {
        Ok(Self {
            major: major.try_into()?,
            minor: minor.try_into()?,
        })
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::new(MajorPriority::Normal, MinorPriority::Low)
    }
}

/// 7-bit CBUS node identifier (the "CANID" of a module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(NODE_ID_MASK as u8);

    /// Returns `HeaderError::InvalidNodeId` for values above 127.
    pub const fn new(raw: u8) -> Result<Self, HeaderError> {
        if raw as u16 > NODE_ID_MASK {
            return Err(HeaderError::InvalidNodeId(raw));
        }

        Ok(Self(raw))
    }

    pub const fn as_raw(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = HeaderError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

/// Decoded form of a CBUS arbitration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub priority: Priority,
    pub node_id: NodeId,
}

impl Header {
    pub const fn new(priority: Priority, node_id: NodeId) -> Self {
        Self { priority, node_id }
    }

    /// The packed 11-bit identifier value.
    pub fn raw(&self) -> u16 {
        ((u8::from(self.priority.major) as u16) << MAJOR_SHIFT)
            | ((u8::from(self.priority.minor) as u16) << MINOR_SHIFT)
            | self.node_id.as_raw() as u16
    }

    pub fn id(&self) -> StandardId {
        // Both priority fields and the node id are range checked on
        // construction, so the packed value never exceeds 0x7FF.
        StandardId::new(self.raw()).unwrap()
    }

    /// The same 11-bit value carried in an extended identifier.
    pub fn extended_id(&self) -> ExtendedId {
        ExtendedId::new(self.raw() as u32).unwrap()
    }

    /// Splits an 11-bit identifier into its fields. Total over all standard ids.
    pub fn from_id(id: StandardId) -> Self {
        Self::from_raw_bits(id.as_raw())
    }

    pub(crate) fn from_raw_bits(raw: u16) -> Self {
        let major = ((raw >> MAJOR_SHIFT) & PRIORITY_MASK) as u8;
        let minor = ((raw >> MINOR_SHIFT) & PRIORITY_MASK) as u8;

        Self {
            // Masked to two bits, so the conversions cannot fail.
            priority: Priority::new(
                major.try_into().unwrap(),
                minor.try_into().unwrap(),
            ),
            node_id: NodeId((raw & NODE_ID_MASK) as u8),
        }
    }
}

/// Packs raw priority and node id values into a CBUS arbitration identifier.
///
/// Out-of-range inputs are rejected rather than masked.
pub fn encode_header(major: u8, minor: u8, node_id: u8) -> Result<StandardId, HeaderError> {
    let priority = Priority::from_raw(major, minor)?;
    let node_id = NodeId::new(node_id)?;

    Ok(Header::new(priority, node_id).id())
}

/// Inverse of [`encode_header`].
pub fn decode_header(id: StandardId) -> Header {
    Header::from_id(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderError {
    #[error("Priority value ({0:?}) is out of the valid range (0..=3)")]
    InvalidPriority(u8),
    #[error("Node id ({0:?}) is out of the valid range (0..=127)")]
    InvalidNodeId(u8),
}
