//! Little-endian primitive writers shared by the RIFF-family encoders
//!
//! RIFF containers (AVI, WAV) and PCX embed little-endian integers, so the
//! writers here emit little-endian unconditionally regardless of host
//! byte order.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::sound::SampleWidth;

/// Little-endian writer over a byte stream.
pub struct ByteSink<W> {
    inner: W,
}

impl<W> ByteSink<W> {
    /// Wrap a byte stream.
    pub fn new(inner: W) -> Self {
        ByteSink { inner }
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink<W> {
    /// Write a single byte.
    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        Ok(())
    }

    /// Write a 16-bit value little-endian.
    pub fn put_u16_le(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        Ok(())
    }

    /// Write a 32-bit value little-endian.
    pub fn put_u32_le(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    /// Write raw bytes unaltered.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Write a four-character tag; exactly 4 bytes, no terminator.
    pub fn put_fourcc(&mut self, tag: &[u8; 4]) -> Result<()> {
        self.inner.write_all(tag)?;
        Ok(())
    }

    /// Write `count` PCM sample elements little-endian.
    ///
    /// 1-byte elements are copied unaltered; 2-byte elements are
    /// re-emitted little-endian whatever the host order. Returns the
    /// number of elements written.
    pub fn put_samples_le(&mut self, buf: &[u8], width: SampleWidth, count: usize) -> Result<usize> {
        let need = count * width.bytes();
        if buf.len() < need {
            return Err(Error::BufferOverflow {
                need,
                have: buf.len(),
            });
        }
        match width {
            SampleWidth::U8 => self.inner.write_all(&buf[..count])?,
            SampleWidth::I16 => {
                for pair in buf[..need].chunks_exact(2) {
                    let v = u16::from_ne_bytes([pair[0], pair[1]]);
                    self.inner.write_u16::<LittleEndian>(v)?;
                }
            }
        }
        Ok(count)
    }

    /// Flush buffered output to the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> ByteSink<W> {
    /// Current absolute position in the stream.
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_primitive_little_endian() {
        let mut sink = ByteSink::new(Cursor::new(Vec::new()));
        sink.put_u16_le(0x1234).unwrap();
        sink.put_u32_le(0xDEADBEEF).unwrap();
        sink.put_fourcc(b"RIFF").unwrap();
        let bytes = sink.into_inner().into_inner();
        assert_eq!(&bytes[0..2], &[0x34, 0x12]);
        assert_eq!(&bytes[2..6], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(&bytes[6..10], b"RIFF");
    }

    #[test]
    fn test_samples_8bit_passthrough() {
        let mut sink = ByteSink::new(Cursor::new(Vec::new()));
        let written = sink
            .put_samples_le(&[0x10, 0x20, 0x30], SampleWidth::U8, 3)
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(sink.into_inner().into_inner(), vec![0x10, 0x20, 0x30]);
    }

    #[test]
    fn test_samples_16bit_little_endian() {
        let mut sink = ByteSink::new(Cursor::new(Vec::new()));
        let samples = [0x0201u16.to_ne_bytes(), 0x0403u16.to_ne_bytes()].concat();
        let written = sink.put_samples_le(&samples, SampleWidth::I16, 2).unwrap();
        assert_eq!(written, 2);
        assert_eq!(sink.into_inner().into_inner(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_samples_short_buffer() {
        let mut sink = ByteSink::new(Cursor::new(Vec::new()));
        let err = sink
            .put_samples_le(&[0u8; 3], SampleWidth::I16, 2)
            .unwrap_err();
        assert!(matches!(err, Error::BufferOverflow { need: 4, have: 3 }));
    }

    #[test]
    fn test_tell_and_seek() {
        let mut sink = ByteSink::new(Cursor::new(Vec::new()));
        sink.put_u32_le(0).unwrap();
        assert_eq!(sink.tell().unwrap(), 4);
        sink.seek(0).unwrap();
        sink.put_u32_le(0x01020304).unwrap();
        assert_eq!(sink.into_inner().into_inner(), vec![0x04, 0x03, 0x02, 0x01]);
    }
}
