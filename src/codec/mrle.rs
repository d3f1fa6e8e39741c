//! Microsoft RLE8 video codec
//!
//! Scan lines are encoded bottom-up as (count, value) run pairs with the
//! `00 00` end-of-line, `00 02 dx dy` delta and `00 01` end-of-bitmap
//! escapes. Inter-frames skip pixels unchanged since the previous frame
//! with delta escapes; unchanged rows collapse to a bare end-of-line.

use crate::codec::{CodecInfo, VideoCodec};
use crate::error::{Error, Result};
use crate::screen::{Palette, VideoArea};

static MRLE_INFO: CodecInfo = CodecInfo {
    id: "mrle",
    name: "Microsoft Run-Length Encoding",
    fourcc: *b"MRLE",
    // BI_RLE8
    avi_compression: [1, 0, 0, 0],
    uses_interframes: true,
};

/// RLE8 encoder state: the capture region and the previous frame's pixels.
pub struct MrleCodec {
    area: VideoArea,
    prev: Vec<u8>,
}

impl MrleCodec {
    pub fn new() -> Self {
        MrleCodec {
            area: VideoArea::full(),
            prev: Vec::new(),
        }
    }
}

impl Default for MrleCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds-checked byte writer over the caller's frame buffer.
struct RleOut<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl RleOut<'_> {
    fn put(&mut self, byte: u8) -> Result<()> {
        if self.len >= self.buf.len() {
            return Err(Error::BufferOverflow {
                need: self.len + 1,
                have: self.buf.len(),
            });
        }
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }
}

/// Emit one row as encoded-mode runs (up to 255 pixels per run).
fn encode_row(out: &mut RleOut<'_>, row: &[u8]) -> Result<()> {
    let mut x = 0;
    while x < row.len() {
        let value = row[x];
        let mut run = 1;
        while run < 255 && x + run < row.len() && row[x + run] == value {
            run += 1;
        }
        out.put(run as u8)?;
        out.put(value)?;
        x += run;
    }
    Ok(())
}

/// Emit one row as a delta against the previous frame's row.
///
/// Unchanged spans of four or more pixels become `00 02 dx 00` skips;
/// shorter unchanged spans are cheaper to re-encode as ordinary runs. A
/// fully unchanged row tail emits nothing and lets end-of-line advance.
fn encode_row_delta(out: &mut RleOut<'_>, cur: &[u8], prev: &[u8]) -> Result<()> {
    let width = cur.len();
    let mut x = 0;
    while x < width {
        if cur[x] == prev[x] {
            let mut same = 1;
            while x + same < width && cur[x + same] == prev[x + same] {
                same += 1;
            }
            if x + same == width {
                break;
            }
            if same >= 4 {
                let mut rest = same;
                while rest > 0 {
                    let dx = rest.min(255);
                    out.put(0)?;
                    out.put(2)?;
                    out.put(dx as u8)?;
                    out.put(0)?;
                    rest -= dx;
                }
                x += same;
                continue;
            }
        }
        let value = cur[x];
        let mut run = 1;
        while run < 255 && x + run < width && cur[x + run] == value {
            run += 1;
        }
        out.put(run as u8)?;
        out.put(value)?;
        x += run;
    }
    Ok(())
}

impl VideoCodec for MrleCodec {
    fn info(&self) -> &'static CodecInfo {
        &MRLE_INFO
    }

    fn init(&mut self, area: VideoArea, _palette: &Palette) -> Result<usize> {
        self.area = area;
        self.prev = vec![0; area.pixels()];
        // worst case: every pixel its own run pair, an end-of-line per row,
        // one end-of-bitmap
        Ok(area.height * (2 * area.width + 2) + 2)
    }

    fn frame(&mut self, screen: &[u8], keyframe: bool, out: &mut [u8]) -> Result<usize> {
        self.area.check_frame(screen)?;
        let mut rle = RleOut { buf: out, len: 0 };

        // RLE8 scan order is bottom-up
        for y in (0..self.area.height).rev() {
            let row = self.area.row(screen, y);
            if keyframe {
                encode_row(&mut rle, row)?;
            } else {
                let prev_row = &self.prev[y * self.area.width..(y + 1) * self.area.width];
                encode_row_delta(&mut rle, row, prev_row)?;
            }
            if y > 0 {
                rle.put(0)?;
                rle.put(0)?;
            }
        }
        rle.put(0)?;
        rle.put(1)?;
        let len = rle.len;

        for y in 0..self.area.height {
            let row = self.area.row(screen, y);
            self.prev[y * self.area.width..(y + 1) * self.area.width].copy_from_slice(row);
        }
        Ok(len)
    }

    fn end(&mut self) {
        self.prev = Vec::new();
    }
}
