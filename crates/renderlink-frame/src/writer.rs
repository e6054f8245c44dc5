use std::io::{ErrorKind, Write};

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::FrameConfig;

/// Writes complete frames to any `Write` stream.
///
/// Each call writes one whole frame and flushes, so a frame is never left
/// half-buffered between calls. Like the reader, the writer is single-owner.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Write one 4-byte big-endian unsigned integer frame (blocking).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.put_all(&value.to_be_bytes())?;
        self.flush()
    }

    /// Write one string frame: u32 UTF-8 byte length, then the bytes.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.check_payload_size(bytes.len())?;
        self.put_all(&(bytes.len() as u32).to_be_bytes())?;
        self.put_all(bytes)?;
        self.flush()
    }

    /// Write one blob frame: u32 byte length, then the raw bytes.
    pub fn write_blob(&mut self, payload: &[u8]) -> Result<()> {
        self.check_payload_size(payload.len())?;
        self.put_all(&(payload.len() as u32).to_be_bytes())?;
        self.put_all(payload)?;
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn put_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.inner.write(bytes) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    fn check_payload_size(&self, len: usize) -> Result<()> {
        if len > self.config.max_payload_size {
            debug!(
                size = len,
                max = self.config.max_payload_size,
                "refusing to write oversized payload"
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
