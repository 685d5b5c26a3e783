//! Handling of messages/frames

use embedded_can::{Frame as _, Id, StandardId};

/// Largest payload of a classic CAN frame
pub const MAX_DATA_LEN: usize = 8;

/// Classic CAN data frame with a standard identifier
///
/// The payload always occupies 8 bytes; only the first `len` are meaningful.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    id: StandardId,
    len: u8,
    data: [u8; MAX_DATA_LEN],
}

impl Frame {
    /// Create a data frame from a full payload buffer of which `len` bytes are
    /// valid. Returns `None` if `len` exceeds 8.
    pub fn from_buffer(id: StandardId, data: [u8; MAX_DATA_LEN], len: u8) -> Option<Self> {
        (usize::from(len) <= MAX_DATA_LEN).then_some(Self { id, len, data })
    }

    /// Identifier of the frame
    pub fn standard_id(&self) -> StandardId {
        self.id
    }

    /// The whole 8-byte payload buffer, including bytes past `len`
    pub fn buffer(&self) -> &[u8; MAX_DATA_LEN] {
        &self.data
    }

    /// Frame as read from the receive buffer; a DLC above 8 means 8 bytes
    pub(crate) fn received(id: StandardId, data: [u8; MAX_DATA_LEN], dlc: u8) -> Self {
        Self {
            id,
            len: dlc.min(MAX_DATA_LEN as u8),
            data,
        }
    }

    pub(crate) fn len(&self) -> u8 {
        self.len
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Frame {{ id: {=u16:#x}, data: {=[u8]:#x} }}",
            self.id.as_raw(),
            self.data()
        )
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let id = match id.into() {
            Id::Standard(id) => id,
            Id::Extended(_) => return None,
        };
        let mut buffer = [0; MAX_DATA_LEN];
        buffer.get_mut(..data.len())?.copy_from_slice(data);
        Self::from_buffer(id, buffer, data.len() as u8)
    }

    /// Remote frames are not used by the bootloader protocol.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Standard(self.id)
    }

    fn dlc(&self) -> usize {
        self.len.into()
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc()]
    }
}

/// Packs a payload into the two data registers; bytes 0-3 go to the first
/// register and 4-7 to the second, least significant byte first.
pub(crate) fn pack(data: &[u8; MAX_DATA_LEN]) -> [u32; 2] {
    [
        u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
        u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
    ]
}

/// Inverse of [`pack`]
pub(crate) fn unpack(words: [u32; 2]) -> [u8; MAX_DATA_LEN] {
    let [a0, a1, a2, a3] = words[0].to_le_bytes();
    let [b0, b1, b2, b3] = words[1].to_le_bytes();
    [a0, a1, a2, a3, b0, b1, b2, b3]
}
