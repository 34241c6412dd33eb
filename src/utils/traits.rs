use serde::{de::DeserializeOwned, Serialize};

use crate::fs::{Result, VfsError};

/// Trait for digesting an object which stores digest in the object itself
pub trait DigestInSelf {
    fn digest(&mut self);
    fn verify_digest(&mut self) -> bool;
}

/// Trait for serializing and deserializing an object which stores digest in the object itself
/// # Note
/// This trait is implemented for types implementing
/// [Serialize] and [DeserializeOwned] and [DigestInSelf]
pub trait SerializeAndDigest: Serialize + DeserializeOwned + DigestInSelf {
    /// serialize into a [Vec](std::vec::Vec), refreshing the digest first
    fn serialize(&mut self) -> Result<Vec<u8>> {
        self.digest();
        let config = bincode::config::legacy();
        Ok(bincode::serde::encode_to_vec(&*self, config)?)
    }

    /// deserialize from a slice
    /// # Returns
    /// The deserialized object if its digest matches
    fn deserialize(buf: &[u8]) -> Result<Self> {
        let config = bincode::config::legacy();
        let (mut object, _bytes_read): (Self, usize) =
            bincode::serde::decode_from_slice(buf, config)?;
        if !object.verify_digest() {
            Err(VfsError::BadImage(
                "deserialized object digest verification failed".into(),
            ))
        } else {
            Ok(object)
        }
    }
}

/// Trait for records stored in fixed-size slots on disk
/// # Note
/// The encoded form is zero-padded up to [FixedRecord::RECORD_SIZE]
pub trait FixedRecord: Serialize + DeserializeOwned {
    const RECORD_SIZE: usize;

    fn to_record(&self) -> Result<Vec<u8>> {
        let config = bincode::config::legacy();
        let mut record = bincode::serde::encode_to_vec(self, config)?;
        assert!(
            record.len() <= Self::RECORD_SIZE,
            "record of {} bytes overflows its {} byte slot",
            record.len(),
            Self::RECORD_SIZE
        );
        record.resize(Self::RECORD_SIZE, 0);
        Ok(record)
    }

    fn from_record(record: &[u8]) -> Result<Self> {
        let config = bincode::config::legacy();
        let (object, _bytes_read) = bincode::serde::decode_from_slice(record, config)?;
        Ok(object)
    }
}
