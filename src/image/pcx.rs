//! PCX version-5 still-image writer
//!
//! PCX is a lossless DOS-era image format that is still widely supported
//! by viewers. Compression is per-scan-line run-length encoding, which
//! works well when neighboring pixels share a color. When two framebuffers
//! are supplied the image is written as blended 24-bit RGB planes instead
//! of palette indices.

use std::io::Write;

use crate::error::Result;
use crate::screen::{Palette, VideoArea};
use crate::sink::ByteSink;

/// Encode one scan line as PCX RLE.
///
/// Runs are 1..=63 pixels; the `0xC0 | len` count byte is only emitted
/// when the run is longer than one pixel or the value itself would parse
/// as a count. Runs never span scan lines.
fn rle_line<W: Write>(sink: &mut ByteSink<W>, row: &[u8]) -> Result<()> {
    let mut x = 0;
    while x < row.len() {
        let value = row[x];
        let mut run = 1;
        while run < 63 && x + run < row.len() && row[x + run] == value {
            run += 1;
        }
        if run > 1 || value >= 0xC0 {
            sink.put_u8(0xC0 | run as u8)?;
        }
        sink.put_u8(value)?;
        x += run;
    }
    Ok(())
}

/// One color plane of a blended scan line: the average of the two
/// framebuffers' palette-mapped component, selected by bit shift
/// (16 = red, 8 = green, 0 = blue).
fn blended_plane(palette: &Palette, row1: &[u8], row2: &[u8], shift: u32, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        let a = (palette.packed(row1[i]) >> shift) & 0xFF;
        let b = (palette.packed(row2[i]) >> shift) & 0xFF;
        *byte = ((a + b) >> 1) as u8;
    }
}

/// Write the captured region as a PCX file.
///
/// `interlaced` optionally supplies a second framebuffer holding the other
/// field's scan lines; when present, three RGB planes blending both fields
/// are written per scan line and the palette trailer is omitted.
pub fn write_pcx<W: Write>(
    writer: W,
    area: VideoArea,
    palette: &Palette,
    screen: &[u8],
    interlaced: Option<&[u8]>,
) -> Result<()> {
    area.check_frame(screen)?;
    if let Some(second) = interlaced {
        area.check_frame(second)?;
    }

    let mut sink = ByteSink::new(writer);

    sink.put_u8(0x0A)?; // pcx signature
    sink.put_u8(0x05)?; // version 5
    sink.put_u8(0x01)?; // RLE encoding
    sink.put_u8(0x08)?; // bits per pixel
    sink.put_u16_le(0)?; // XMin
    sink.put_u16_le(0)?; // YMin
    sink.put_u16_le(area.width as u16 - 1)?; // XMax
    sink.put_u16_le(area.height as u16 - 1)?; // YMax
    sink.put_u16_le(0)?; // HRes
    sink.put_u16_le(0)?; // VRes
    sink.put_bytes(&[0u8; 48])?; // EGA color palette
    sink.put_u8(0)?; // reserved
    sink.put_u8(if interlaced.is_some() { 3 } else { 1 })?; // bit planes
    sink.put_u16_le(area.width as u16)?; // bytes per scan line per plane
    sink.put_u16_le(1)?; // palette info
    sink.put_u16_le(area.width as u16)?; // screen resolution
    sink.put_u16_le(area.height as u16)?;
    sink.put_bytes(&[0u8; 54])?; // unused

    match interlaced {
        None => {
            for y in 0..area.height {
                rle_line(&mut sink, area.row(screen, y))?;
            }
            // palette trailer
            sink.put_u8(0x0C)?;
            for i in 0..=255u8 {
                let (r, g, b) = palette.rgb(i);
                sink.put_u8(r)?;
                sink.put_u8(g)?;
                sink.put_u8(b)?;
            }
        }
        Some(second) => {
            let mut plane_row = vec![0u8; area.width];
            for y in 0..area.height {
                let row1 = area.row(screen, y);
                let row2 = area.row(second, y);
                for shift in [16, 8, 0] {
                    blended_plane(palette, row1, row2, shift, &mut plane_row);
                    rle_line(&mut sink, &plane_row)?;
                }
            }
        }
    }

    sink.flush()
}
