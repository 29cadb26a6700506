use embedded_can::Id;

use crate::{header::Header, MAX_DATA_LENGTH};

/// A CAN 2.0 frame as exchanged with a controller adapter.
///
/// The DLC is at most 8. Data frames carry exactly `dlc` bytes; remote
/// (RTR) frames carry a DLC but no data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    id: Id,
    dlc: usize,
    data: Option<[u8; MAX_DATA_LENGTH]>,
}

impl Frame {
    /// Creates a new data frame. Fails with [`FrameError::MalformedFrame`]
    /// if `data` is longer than 8 bytes, before anything is copied.
    pub fn new_data(id: impl Into<Id>, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LENGTH {
            return Err(FrameError::MalformedFrame(data.len()));
        }

        let mut copy = [0u8; MAX_DATA_LENGTH];
        copy[..data.len()].copy_from_slice(data);

        Ok(Self {
            id: id.into(),
            dlc: data.len(),
            data: Some(copy),
        })
    }

    /// Creates a new remote frame. `dlc` must be in the range 0..=8.
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Result<Self, FrameError> {
        if dlc > MAX_DATA_LENGTH {
            return Err(FrameError::MalformedFrame(dlc));
        }

        Ok(Self {
            id: id.into(),
            dlc,
            data: None,
        })
    }

    /// Gets the identifier of the frame
    pub fn id(&self) -> Id {
        self.id
    }

    /// Raw identifier value, 11 or 29 bits wide depending on the id kind
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    /// Gets the DLC (Data Length Code) of the frame
    pub fn dlc(&self) -> usize {
        self.dlc
    }

    /// Gets the data associated with the frame. Will return `None` if it is an
    /// RTR frame.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|d| &d[..self.dlc])
    }

    pub fn is_remote(&self) -> bool {
        self.data.is_none()
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    /// Decodes the CBUS header. Extended frames do not carry one.
    pub fn header(&self) -> Option<Header> {
        match self.id {
            Id::Standard(id) => Some(Header::from_id(id)),
            Id::Extended(_) => None,
        }
    }

    /// Copy of this frame under a different identifier.
    pub fn with_id(&self, id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Copy of this frame turned into a remote request with the same DLC.
    pub fn to_remote(&self) -> Self {
        Self {
            data: None,
            ..self.clone()
        }
    }

    /// Copy of this frame as a data frame. A remote frame becomes a
    /// zero-filled payload of its DLC.
    pub fn to_data(&self) -> Self {
        Self {
            data: Some(self.data.unwrap_or([0u8; MAX_DATA_LENGTH])),
            ..self.clone()
        }
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        Frame::new_remote(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        Frame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        Frame::data(self).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("Frame length ({0:?}) is out of the valid range (0..=8)")]
    MalformedFrame(usize),
}

#[cfg(test)]
mod tests {
    use embedded_can::{ExtendedId, Frame as _, StandardId};

    use crate::{encode_header, Frame, FrameError, MajorPriority, MinorPriority};

    #[test]
    fn data_frames() {
        let frame = Frame::new_data(StandardId::new(300).unwrap(), &[1, 2, 3]).unwrap();

        assert_eq!(frame.raw_id(), 300);
        assert_eq!(frame.dlc(), 3);
        assert_eq!(frame.data(), Some(&[1u8, 2, 3][..]));
        assert!(!frame.is_remote());
        assert!(!frame.is_extended());

        let empty = Frame::new_data(StandardId::MAX, &[]).unwrap();
        assert_eq!(empty.data(), Some(&[][..]));

        let full = Frame::new_data(ExtendedId::MAX, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(full.dlc(), 8);
        assert!(full.is_extended());
        assert_eq!(full.raw_id(), 0x1FFF_FFFF);
    }

    #[test]
    fn oversized_frames_are_rejected() {
        assert_eq!(
            Frame::new_data(StandardId::ZERO, &[0; 9]),
            Err(FrameError::MalformedFrame(9))
        );
        assert_eq!(
            Frame::new_remote(StandardId::ZERO, 9),
            Err(FrameError::MalformedFrame(9))
        );
        assert!(<Frame as embedded_can::Frame>::new(StandardId::ZERO, &[0; 12]).is_none());
    }

    #[test]
    fn remote_frames() {
        let frame = Frame::new_remote(StandardId::new(0x10).unwrap(), 0).unwrap();

        assert!(frame.is_remote());
        assert!(frame.is_remote_frame());
        assert_eq!(frame.data(), None);
        assert_eq!(embedded_can::Frame::data(&frame), &[] as &[u8]);

        let converted = Frame::new_data(StandardId::ZERO, &[9, 9]).unwrap().to_remote();
        assert!(converted.is_remote());
        assert_eq!(converted.dlc(), 2);

        let restored = Frame::new_remote(StandardId::ZERO, 3).unwrap().to_data();
        assert!(!restored.is_remote());
        assert_eq!(restored.data(), Some(&[0u8, 0, 0][..]));

        let kept = Frame::new_data(StandardId::ZERO, &[4, 5]).unwrap();
        assert_eq!(kept.to_data(), kept);
    }

    #[test]
    fn header_of_standard_frames() {
        let id = encode_header(0, 2, 99).unwrap();
        let frame = Frame::new_data(id, &[0x90]).unwrap();
        let header = frame.header().unwrap();

        assert_eq!(header.priority.major, MajorPriority::High);
        assert_eq!(header.priority.minor, MinorPriority::Normal);
        assert_eq!(header.node_id.as_raw(), 99);

        let restamped = frame.with_id(ExtendedId::new(id.as_raw() as u32).unwrap());
        assert!(restamped.header().is_none());
        assert_eq!(restamped.data(), frame.data());
    }
}
