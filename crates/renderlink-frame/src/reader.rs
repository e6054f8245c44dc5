use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::error::{FrameError, Result};
use crate::{FrameConfig, BLOB_CHUNK_SIZE, INT_SIZE};

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
/// The reader is single-owner; callers needing mutual exclusion across
/// threads wrap it in their own lock.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read one 4-byte big-endian unsigned integer frame (blocking).
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; INT_SIZE];
        self.fill_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Read one string frame: u32 byte length, then UTF-8 bytes (blocking).
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        self.check_payload_size(len)?;
        let mut buf = vec![0u8; len];
        self.fill_exact(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Read one blob frame: u32 byte length, then raw bytes (blocking).
    ///
    /// Short reads from the transport are accumulated until the declared
    /// length is consumed, capped at [`BLOB_CHUNK_SIZE`] bytes per read.
    pub fn read_blob(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        self.check_payload_size(len)?;

        let mut payload = BytesMut::with_capacity(len.min(BLOB_CHUNK_SIZE));
        let mut chunk = [0u8; BLOB_CHUNK_SIZE];
        while payload.len() < len {
            let want = (len - payload.len()).min(BLOB_CHUNK_SIZE);
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => payload.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(payload.freeze())
    }

    fn fill_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    fn check_payload_size(&self, len: usize) -> Result<()> {
        if len > self.config.max_payload_size {
            // A length this far out usually means a desynchronized stream,
            // not a genuinely huge payload.
            warn!(
                declared = len,
                max = self.config.max_payload_size,
                "rejecting oversized inbound payload"
            );
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
