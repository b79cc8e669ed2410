//! Credential persistence in the last page of internal flash.

use core::fmt;

use embassy_stm32::flash::{Blocking, Error as FlashError, Flash};
use pcm_core::credentials::{
    CredentialStore, Credentials, RECORD_LEN, RecordError, decode_record, encode_record,
};

/// Offset of the credential page from the start of flash.
pub const CREDENTIAL_PAGE_OFFSET: u32 = 0x7_F800;
pub const CREDENTIAL_PAGE_SIZE: u32 = 2048;

#[derive(Debug)]
pub enum FlashStoreError {
    Flash(FlashError),
    Record(RecordError),
}

impl fmt::Display for FlashStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashStoreError::Flash(error) => write!(f, "flash operation failed: {error:?}"),
            FlashStoreError::Record(error) => write!(f, "{error}"),
        }
    }
}

pub struct FlashCredentialStore {
    flash: Flash<'static, Blocking>,
}

impl FlashCredentialStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }
}

impl CredentialStore for FlashCredentialStore {
    type Error = FlashStoreError;

    fn load(&mut self) -> Result<Option<Credentials>, Self::Error> {
        let mut record = [0u8; RECORD_LEN];
        self.flash
            .blocking_read(CREDENTIAL_PAGE_OFFSET, &mut record)
            .map_err(FlashStoreError::Flash)?;
        decode_record(&record).map_err(FlashStoreError::Record)
    }

    fn store(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        let record = encode_record(credentials).map_err(FlashStoreError::Record)?;
        self.flash
            .blocking_erase(
                CREDENTIAL_PAGE_OFFSET,
                CREDENTIAL_PAGE_OFFSET + CREDENTIAL_PAGE_SIZE,
            )
            .map_err(FlashStoreError::Flash)?;
        self.flash
            .blocking_write(CREDENTIAL_PAGE_OFFSET, &record)
            .map_err(FlashStoreError::Flash)
    }
}
