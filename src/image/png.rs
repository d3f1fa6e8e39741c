//! PNG still-image writer
//!
//! Compression is delegated to the `png` crate. Single framebuffers are
//! written as 8-bit indexed images carrying the palette; interlaced pairs
//! are blended into 24-bit RGB. A bounded in-memory mode backs the
//! Motion-PNG codec.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::screen::{Palette, VideoArea};

fn map_compression(level: u32) -> png::Compression {
    match level {
        0..=3 => png::Compression::Fast,
        4..=6 => png::Compression::Default,
        _ => png::Compression::Best,
    }
}

fn encoding_error(e: png::EncodingError) -> Error {
    match e {
        png::EncodingError::IoError(io) => Error::Io(io),
        other => Error::codec(other.to_string()),
    }
}

/// Write the captured region as a non-interlaced PNG file.
///
/// `interlaced` optionally supplies the second field's framebuffer; the
/// output is then RGB with each pixel the component-wise average of the
/// two palette lookups, otherwise an 8-bit indexed image.
pub fn write_png<W: Write>(
    writer: W,
    area: VideoArea,
    palette: &Palette,
    screen: &[u8],
    interlaced: Option<&[u8]>,
    compression_level: u32,
) -> Result<()> {
    area.check_frame(screen)?;
    if let Some(second) = interlaced {
        area.check_frame(second)?;
    }

    let mut encoder = png::Encoder::new(writer, area.width as u32, area.height as u32);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(map_compression(compression_level));

    match interlaced {
        None => {
            encoder.set_color(png::ColorType::Indexed);
            let mut plte = Vec::with_capacity(256 * 3);
            for i in 0..=255u8 {
                let (r, g, b) = palette.rgb(i);
                plte.extend_from_slice(&[r, g, b]);
            }
            encoder.set_palette(plte);

            let mut writer = encoder.write_header().map_err(encoding_error)?;
            let mut data = Vec::with_capacity(area.pixels());
            for y in 0..area.height {
                data.extend_from_slice(area.row(screen, y));
            }
            writer.write_image_data(&data).map_err(encoding_error)?;
            writer.finish().map_err(encoding_error)?;
        }
        Some(second) => {
            encoder.set_color(png::ColorType::Rgb);

            let mut writer = encoder.write_header().map_err(encoding_error)?;
            let mut data = Vec::with_capacity(area.pixels() * 3);
            for y in 0..area.height {
                let row1 = area.row(screen, y);
                let row2 = area.row(second, y);
                for x in 0..area.width {
                    let (r1, g1, b1) = palette.rgb(row1[x]);
                    let (r2, g2, b2) = palette.rgb(row2[x]);
                    data.push(((u16::from(r1) + u16::from(r2)) >> 1) as u8);
                    data.push(((u16::from(g1) + u16::from(g2)) >> 1) as u8);
                    data.push(((u16::from(b1) + u16::from(b2)) >> 1) as u8);
                }
            }
            writer.write_image_data(&data).map_err(encoding_error)?;
            writer.finish().map_err(encoding_error)?;
        }
    }
    Ok(())
}

/// Fixed-capacity sink with a running size accumulator; filling up poisons
/// the accumulator and fails the write.
pub(crate) struct BoundedBuffer<'a> {
    buf: &'a mut [u8],
    len: usize,
    needed: usize,
    overflowed: bool,
}

impl<'a> BoundedBuffer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        BoundedBuffer {
            buf,
            len: 0,
            needed: 0,
            overflowed: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn overflowed(&self) -> bool {
        self.overflowed
    }
}

impl Write for BoundedBuffer<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.overflowed || self.len + data.len() > self.buf.len() {
            self.needed = self.len + data.len();
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "image buffer full",
            ));
        }
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encode the region as an indexed PNG into a caller-supplied buffer,
/// returning the number of bytes produced. A buffer too small for the
/// image fails with [`Error::BufferOverflow`].
pub fn write_png_to_buffer(
    area: VideoArea,
    palette: &Palette,
    screen: &[u8],
    compression_level: u32,
    out: &mut [u8],
) -> Result<usize> {
    let capacity = out.len();
    let mut buffer = BoundedBuffer::new(out);
    match write_png(
        &mut buffer,
        area,
        palette,
        screen,
        None,
        compression_level,
    ) {
        Ok(()) => Ok(buffer.len()),
        Err(_) if buffer.overflowed() => Err(Error::BufferOverflow {
            need: buffer.needed,
            have: capacity,
        }),
        Err(e) => Err(e),
    }
}
