//! Streaming RIFF/WAVE writer
//!
//! The 44-byte header is written with zeroed length fields at open time;
//! the file only becomes valid when `close` backpatches the RIFF and data
//! chunk sizes. Samples are raw little-endian PCM.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::MAX_RECORDING_SIZE;
use crate::sink::ByteSink;
use crate::sound::AudioFormat;

/// Streaming WAV writer over a seekable byte stream.
pub struct WavWriter<W: Write + Seek> {
    sink: ByteSink<W>,
    format: AudioFormat,
    fps: f64,
    bytes_written: u64,
    frames_written: u64,
}

impl WavWriter<BufWriter<File>> {
    /// Create a WAV file on disk.
    pub fn create<P: AsRef<Path>>(path: P, format: AudioFormat, fps: f64) -> Result<Self> {
        let file = File::create(path)?;
        Self::open(BufWriter::new(file), format, fps)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Write the prospective header and return the open writer.
    ///
    /// `fps` is the emulator frame rate, used only to report elapsed time
    /// (one `write_samples` call per video frame).
    pub fn open(writer: W, format: AudioFormat, fps: f64) -> Result<Self> {
        let mut sink = ByteSink::new(writer);

        sink.put_fourcc(b"RIFF")?;
        sink.put_u32_le(0)?; // file length, backpatched on close
        sink.put_fourcc(b"WAVE")?;

        sink.put_fourcc(b"fmt ")?;
        sink.put_u32_le(16)?;
        sink.put_u16_le(1)?; // PCM
        sink.put_u16_le(format.channels)?;
        sink.put_u32_le(format.sample_rate)?;
        sink.put_u32_le(format.sample_rate * format.width.bytes() as u32)?;
        sink.put_u16_le(format.block_align())?;
        sink.put_u16_le(format.width.bits())?;

        sink.put_fourcc(b"data")?;
        sink.put_u32_le(0)?; // data length, backpatched on close

        if sink.tell()? != 44 {
            return Err(Error::protocol("WAV header landed at the wrong offset"));
        }

        Ok(WavWriter {
            sink,
            format,
            fps,
            bytes_written: 0,
            frames_written: 0,
        })
    }

    /// Append PCM samples, returning the number of bytes written.
    ///
    /// Crossing the recording size ceiling completes the write but fails
    /// with [`Error::SizeLimit`]; the caller must close the file.
    pub fn write_samples(&mut self, buf: &[u8], num_samples: usize) -> Result<usize> {
        if num_samples == 0 {
            return Ok(0);
        }
        let written = self.sink.put_samples_le(buf, self.format.width, num_samples)?;
        let bytes = written * self.format.width.bytes();
        self.bytes_written += bytes as u64;
        self.frames_written += 1;
        if self.bytes_written > MAX_RECORDING_SIZE {
            return Err(Error::SizeLimit);
        }
        Ok(bytes)
    }

    /// Backpatch the header lengths and flush, returning the underlying
    /// stream. RIFF chunks are word-aligned, so an odd data length gets one
    /// zero pad byte that is counted in the RIFF size but not in the data
    /// chunk size.
    pub fn close(mut self) -> Result<W> {
        let mut pad = 0u32;
        if self.bytes_written & 1 == 1 {
            self.sink.put_u8(0)?;
            pad = 1;
        }
        self.sink.seek(4)?;
        self.sink.put_u32_le(self.bytes_written as u32 + 36 + pad)?;
        self.sink.seek(40)?;
        self.sink.put_u32_le(self.bytes_written as u32)?;
        self.sink.flush()?;
        Ok(self.sink.into_inner())
    }

    /// Duration of the recording so far in whole seconds.
    pub fn elapsed_time(&self) -> u64 {
        (self.frames_written as f64 / self.fps) as u64
    }

    /// Approximate size of the file so far in bytes.
    pub fn current_size(&self) -> u64 {
        self.bytes_written
    }

    /// Short format tag for the status display.
    pub fn description(&self) -> &'static str {
        "WAV"
    }
}
