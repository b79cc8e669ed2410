//! Wi-Fi credential pair, its persistence seam, and the fixed-size record
//! layout used by flash-backed stores.

use core::fmt;

use crc::{CRC_32_ISCSI, Crc};
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Longest SSID accepted by the module.
pub const MAX_SSID_LEN: usize = 32;
/// Longest password accepted by the module.
pub const MAX_PASSWORD_LEN: usize = 63;

/// XOR of every byte in `bytes`, seeded with `seed`.
#[must_use]
pub fn xor_checksum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, byte| acc ^ byte)
}

/// Errors raised when a credential field exceeds its bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CredentialsError {
    SsidTooLong { len: usize },
    PasswordTooLong { len: usize },
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::SsidTooLong { len } => {
                write!(f, "ssid of {len} bytes exceeds {MAX_SSID_LEN}")
            }
            CredentialsError::PasswordTooLong { len } => {
                write!(f, "password of {len} bytes exceeds {MAX_PASSWORD_LEN}")
            }
        }
    }
}

/// Network name and passphrase, stored as raw bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    ssid: Vec<u8, MAX_SSID_LEN>,
    password: Vec<u8, MAX_PASSWORD_LEN>,
}

impl Credentials {
    /// Builds a credential pair, rejecting oversized fields.
    pub fn new(ssid: &[u8], password: &[u8]) -> Result<Self, CredentialsError> {
        let ssid = Vec::from_slice(ssid)
            .map_err(|_| CredentialsError::SsidTooLong { len: ssid.len() })?;
        let password = Vec::from_slice(password).map_err(|_| CredentialsError::PasswordTooLong {
            len: password.len(),
        })?;
        Ok(Self { ssid, password })
    }

    #[must_use]
    pub fn ssid_bytes(&self) -> &[u8] {
        &self.ssid
    }

    #[must_use]
    pub fn password_bytes(&self) -> &[u8] {
        &self.password
    }

    /// SSID as text, when it is valid UTF-8.
    #[must_use]
    pub fn ssid(&self) -> Option<&str> {
        core::str::from_utf8(&self.ssid).ok()
    }

    /// Password as text, when it is valid UTF-8.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        core::str::from_utf8(&self.password).ok()
    }

    /// An empty SSID means the module has not been provisioned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ssid.is_empty()
    }

    /// Checksum transmitted at the end of a provisioning transfer.
    #[must_use]
    pub fn checksum(&self) -> u8 {
        xor_checksum(xor_checksum(0, &self.ssid), &self.password)
    }
}

/// Persistent key-value storage for the credential pair.
pub trait CredentialStore {
    type Error;

    /// Reads the stored pair, `Ok(None)` when nothing was ever written.
    fn load(&mut self) -> Result<Option<Credentials>, Self::Error>;

    /// Replaces the stored pair.
    fn store(&mut self, credentials: &Credentials) -> Result<(), Self::Error>;
}

/// Volatile store used by the host emulator and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Option<Credentials>,
    writes: u32,
    reject_writes: bool,
}

/// Error returned by [`MemoryCredentialStore`] when writes are disabled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WriteRejected;

impl fmt::Display for WriteRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("store rejected write")
    }
}

impl MemoryCredentialStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: None,
            writes: 0,
            reject_writes: false,
        }
    }

    /// Creates a store that already holds `credentials`.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Some(credentials),
            ..Self::new()
        }
    }

    /// Makes subsequent writes fail, leaving the slot untouched.
    pub fn set_reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    #[must_use]
    pub fn stored(&self) -> Option<&Credentials> {
        self.slot.as_ref()
    }

    /// Number of successful writes.
    #[must_use]
    pub const fn writes(&self) -> u32 {
        self.writes
    }
}

impl CredentialStore for MemoryCredentialStore {
    type Error = WriteRejected;

    fn load(&mut self) -> Result<Option<Credentials>, Self::Error> {
        Ok(self.slot.clone())
    }

    fn store(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        if self.reject_writes {
            return Err(WriteRejected);
        }
        self.slot = Some(credentials.clone());
        self.writes = self.writes.wrapping_add(1);
        Ok(())
    }
}

/// Marker written ahead of the serialized pair. An erased page reads back as
/// `0xFF` and never matches.
pub const RECORD_MAGIC: u32 = 0x5043_4D31;
/// Encoded record size, a multiple of the 8-byte flash programming unit.
pub const RECORD_LEN: usize = 112;

const MAGIC_LEN: usize = 4;

static RECORD_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Errors raised by the record codec.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordError {
    Encode(postcard::Error),
    Corrupt(postcard::Error),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Encode(error) => write!(f, "record encode failed: {error}"),
            RecordError::Corrupt(error) => write!(f, "stored record is corrupt: {error}"),
        }
    }
}

/// Serializes `credentials` into the on-flash layout: magic, postcard body,
/// CRC-32 trailer, then `0xFF` padding.
pub fn encode_record(credentials: &Credentials) -> Result<[u8; RECORD_LEN], RecordError> {
    let mut record = [0xFF; RECORD_LEN];
    let (magic, body) = record.split_at_mut(MAGIC_LEN);
    magic.copy_from_slice(&RECORD_MAGIC.to_le_bytes());
    postcard::to_slice_crc32(credentials, body, RECORD_CRC.digest()).map_err(RecordError::Encode)?;
    Ok(record)
}

/// Parses a stored record. Erased or foreign pages decode as `Ok(None)`.
pub fn decode_record(record: &[u8; RECORD_LEN]) -> Result<Option<Credentials>, RecordError> {
    let (magic, body) = record.split_at(MAGIC_LEN);
    if magic != RECORD_MAGIC.to_le_bytes().as_slice() {
        return Ok(None);
    }

    postcard::from_bytes_crc32(body, RECORD_CRC.digest())
        .map(Some)
        .map_err(RecordError::Corrupt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials::new(b"HelloWorld1", b"Secret01").expect("valid credentials")
    }

    #[test]
    fn rejects_oversized_fields() {
        assert_eq!(
            Credentials::new(&[b'a'; 33], b""),
            Err(CredentialsError::SsidTooLong { len: 33 })
        );
        assert_eq!(
            Credentials::new(b"net", &[b'p'; 64]),
            Err(CredentialsError::PasswordTooLong { len: 64 })
        );
        assert!(Credentials::new(&[b'a'; 32], &[b'p'; 63]).is_ok());
    }

    #[test]
    fn checksum_covers_both_fields() {
        let credentials = sample();
        let expected = b"HelloWorld1Secret01".iter().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(credentials.checksum(), expected);
    }

    #[test]
    fn record_survives_encode_and_decode() {
        let record = encode_record(&sample()).expect("record fits");
        assert_eq!(decode_record(&record), Ok(Some(sample())));

        let widest = Credentials::new(&[b'a'; MAX_SSID_LEN], &[b'p'; MAX_PASSWORD_LEN])
            .expect("valid credentials");
        let record = encode_record(&widest).expect("record fits");
        assert_eq!(decode_record(&record), Ok(Some(widest)));
    }

    #[test]
    fn erased_page_decodes_as_empty() {
        assert_eq!(decode_record(&[0xFF; RECORD_LEN]), Ok(None));
        assert_eq!(decode_record(&[0x00; RECORD_LEN]), Ok(None));
    }

    #[test]
    fn single_bit_flip_is_rejected() {
        let mut record = encode_record(&sample()).expect("record fits");
        record[MAGIC_LEN + 2] ^= 0x20;
        assert_eq!(
            decode_record(&record),
            Err(RecordError::Corrupt(postcard::Error::DeserializeBadCrc))
        );
    }

    #[test]
    fn paired_bit_flips_are_rejected() {
        let clean = encode_record(&sample()).expect("record fits");
        let ssid_start = MAGIC_LEN + 1;
        for offset in 0..b"HelloWorld1".len() - 1 {
            let mut record = clean;
            record[ssid_start + offset] ^= 0x01;
            record[ssid_start + offset + 1] ^= 0x01;
            assert!(
                matches!(decode_record(&record), Err(RecordError::Corrupt(_))),
                "flips at ssid bytes {offset} and {} went unnoticed",
                offset + 1
            );
        }
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut record = encode_record(&sample()).expect("record fits");
        record[MAGIC_LEN] = 64;
        assert!(matches!(
            decode_record(&record),
            Err(RecordError::Corrupt(_))
        ));
    }

    #[test]
    fn memory_store_can_refuse_writes() {
        let mut store = MemoryCredentialStore::new();
        store.set_reject_writes(true);
        assert_eq!(store.store(&sample()), Err(WriteRejected));
        assert_eq!(store.load(), Ok(None));

        store.set_reject_writes(false);
        store.store(&sample()).expect("write accepted");
        assert_eq!(store.writes(), 1);
        assert_eq!(store.load(), Ok(Some(sample())));
    }
}
