//! Bus frame representation shared by the router, the status publisher, and
//! the provisioning encoder.

use core::fmt;

/// Maximum number of data bytes carried by a classic bus frame.
pub const MAX_DATA_LEN: usize = 8;
/// Largest standard (11-bit) identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Largest extended (29-bit) identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Errors raised when building a frame from caller-provided parts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// More than [`MAX_DATA_LEN`] payload bytes were supplied.
    PayloadTooLong { len: usize },
    /// Identifier does not fit the requested format.
    IdentifierOutOfRange { id: u32 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLong { len } => {
                write!(f, "payload of {len} bytes exceeds {MAX_DATA_LEN}")
            }
            FrameError::IdentifierOutOfRange { id } => {
                write!(f, "identifier {id:#x} out of range")
            }
        }
    }
}

/// A single bus frame. Bytes past `len` are never observed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusFrame {
    id: u32,
    extended: bool,
    remote_request: bool,
    len: u8,
    data: [u8; MAX_DATA_LEN],
}

impl BusFrame {
    /// Builds a standard-format data frame.
    pub fn new(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_STANDARD_ID {
            return Err(FrameError::IdentifierOutOfRange { id });
        }
        Self::build(id, false, payload)
    }

    /// Builds an extended-format data frame.
    pub fn new_extended(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_EXTENDED_ID {
            return Err(FrameError::IdentifierOutOfRange { id });
        }
        Self::build(id, true, payload)
    }

    /// Builds a standard-format remote request (no payload).
    #[must_use]
    pub const fn remote(id: u32) -> Self {
        Self {
            id,
            extended: false,
            remote_request: true,
            len: 0,
            data: [0; MAX_DATA_LEN],
        }
    }

    /// Builds a standard frame from a full data array; `len` is clamped to 8.
    #[must_use]
    pub const fn from_array(id: u32, data: [u8; MAX_DATA_LEN], len: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let len = (if len > MAX_DATA_LEN { MAX_DATA_LEN } else { len }) as u8;
        Self {
            id,
            extended: false,
            remote_request: false,
            len,
            data,
        }
    }

    fn build(id: u32, extended: bool, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_DATA_LEN {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }
        let mut data = [0u8; MAX_DATA_LEN];
        data[..payload.len()].copy_from_slice(payload);
        let mut frame = Self::from_array(id, data, payload.len());
        frame.extended = extended;
        Ok(frame)
    }

    /// Marks the frame as a remote request.
    #[must_use]
    pub const fn with_remote_request(mut self, remote_request: bool) -> Self {
        self.remote_request = remote_request;
        self
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    #[must_use]
    pub const fn is_remote_request(&self) -> bool {
        self.remote_request
    }

    /// Number of valid payload bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the valid payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len()]
    }
}

impl fmt::Display for BusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id={:#05x}", self.id)?;
        if self.extended {
            f.write_str(" ext")?;
        }
        if self.remote_request {
            return f.write_str(" rtr");
        }
        f.write_str(" [")?;
        for (index, byte) in self.payload().iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_only_exposes_declared_bytes() {
        let frame = BusFrame::new(21, &[3, 128]).expect("valid frame");
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.payload(), &[3, 128]);
        assert!(!frame.is_remote_request());
    }

    #[test]
    fn rejects_oversized_payload_and_identifier() {
        assert_eq!(
            BusFrame::new(1, &[0; 9]),
            Err(FrameError::PayloadTooLong { len: 9 })
        );
        assert_eq!(
            BusFrame::new(0x800, &[]),
            Err(FrameError::IdentifierOutOfRange { id: 0x800 })
        );
        assert!(BusFrame::new_extended(0x800, &[1]).is_ok());
    }

    #[test]
    fn remote_request_has_no_payload() {
        let frame = BusFrame::remote(24);
        assert!(frame.is_remote_request());
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn from_array_clamps_length() {
        let frame = BusFrame::from_array(0x1B, [1; 8], 12);
        assert_eq!(frame.len(), 8);
    }
}
