//! Zip Motion Block Video codec
//!
//! The DOSBox capture format in its 8 bpp mode. Keyframes carry a format
//! header and the deflated palette plus raw pixels; inter-frames carry
//! deflated per-block change flags followed by XOR blocks (motion vectors
//! are always zero here). One zlib stream spans the whole recording and is
//! sync-flushed per frame, reset at every keyframe.

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::codec::{CodecInfo, VideoCodec};
use crate::error::{Error, Result};
use crate::screen::{Palette, VideoArea};

static ZMBV_INFO: CodecInfo = CodecInfo {
    id: "zmbv",
    name: "Zip Motion Block Video",
    fourcc: *b"ZMBV",
    avi_compression: *b"ZMBV",
    uses_interframes: true,
};

const VERSION_HIGH: u8 = 0;
const VERSION_LOW: u8 = 1;
const COMPRESSION_ZLIB: u8 = 1;
const FORMAT_8BPP: u8 = 4;
const BLOCK_SIZE: usize = 16;
const FLAG_KEYFRAME: u8 = 0x01;

/// ZMBV encoder state: region, palette bytes, previous frame, the staging
/// buffer for uncompressed frame payloads and the long-lived zlib stream.
pub struct ZmbvCodec {
    area: VideoArea,
    palette: [u8; 768],
    prev: Vec<u8>,
    work: Vec<u8>,
    deflate: Option<Compress>,
    compression_level: u32,
}

impl ZmbvCodec {
    pub fn new(compression_level: u32) -> Self {
        ZmbvCodec {
            area: VideoArea::full(),
            palette: [0; 768],
            prev: Vec::new(),
            work: Vec::new(),
            deflate: None,
            compression_level,
        }
    }

    fn blocks_x(&self) -> usize {
        self.area.width.div_ceil(BLOCK_SIZE)
    }

    fn blocks_y(&self) -> usize {
        self.area.height.div_ceil(BLOCK_SIZE)
    }

    /// Deflate `input` into `out`, sync-flushing so the frame is
    /// independently decodable by a streaming inflater.
    fn deflate_frame(&mut self, out: &mut [u8]) -> Result<usize> {
        let deflate = self
            .deflate
            .as_mut()
            .ok_or_else(|| Error::codec("zmbv codec used before init"))?;
        let mut input = self.work.as_slice();
        let mut written = 0usize;
        loop {
            if written == out.len() {
                return Err(Error::BufferOverflow {
                    need: written + 1,
                    have: out.len(),
                });
            }
            let before_in = deflate.total_in();
            let before_out = deflate.total_out();
            let status = deflate
                .compress(input, &mut out[written..], FlushCompress::Sync)
                .map_err(|e| Error::codec(format!("deflate failed: {}", e)))?;
            let consumed = (deflate.total_in() - before_in) as usize;
            let produced = (deflate.total_out() - before_out) as usize;
            input = &input[consumed..];
            written += produced;
            if status == Status::BufError && produced == 0 && consumed == 0 {
                return Err(Error::BufferOverflow {
                    need: written + 1,
                    have: out.len(),
                });
            }
            if input.is_empty() && produced == 0 {
                return Ok(written);
            }
        }
    }

    fn copy_region(&mut self, screen: &[u8]) {
        for y in 0..self.area.height {
            let row = self.area.row(screen, y);
            self.prev[y * self.area.width..(y + 1) * self.area.width].copy_from_slice(row);
        }
    }
}

impl VideoCodec for ZmbvCodec {
    fn info(&self) -> &'static CodecInfo {
        &ZMBV_INFO
    }

    fn init(&mut self, area: VideoArea, palette: &Palette) -> Result<usize> {
        self.area = area;
        for i in 0..=255u8 {
            let (r, g, b) = palette.rgb(i);
            self.palette[i as usize * 3] = r;
            self.palette[i as usize * 3 + 1] = g;
            self.palette[i as usize * 3 + 2] = b;
        }
        self.prev = vec![0; area.pixels()];
        let payload = 768 + area.pixels() + 2 * self.blocks_x() * self.blocks_y() + 4;
        self.work = Vec::with_capacity(payload);
        self.deflate = Some(Compress::new(
            Compression::new(self.compression_level.min(9)),
            true,
        ));
        Ok(7 + payload + payload / 16 + 256)
    }

    fn frame(&mut self, screen: &[u8], keyframe: bool, out: &mut [u8]) -> Result<usize> {
        self.area.check_frame(screen)?;
        let header_len = if keyframe {
            if out.len() < 7 {
                return Err(Error::BufferOverflow {
                    need: 7,
                    have: out.len(),
                });
            }
            out[0] = FLAG_KEYFRAME;
            out[1] = VERSION_HIGH;
            out[2] = VERSION_LOW;
            out[3] = COMPRESSION_ZLIB;
            out[4] = FORMAT_8BPP;
            out[5] = BLOCK_SIZE as u8;
            out[6] = BLOCK_SIZE as u8;

            self.work.clear();
            self.work.extend_from_slice(&self.palette);
            for y in 0..self.area.height {
                let row = self.area.row(screen, y);
                self.work.extend_from_slice(row);
            }

            if let Some(deflate) = self.deflate.as_mut() {
                deflate.reset();
            }
            7
        } else {
            if out.is_empty() {
                return Err(Error::BufferOverflow {
                    need: 1,
                    have: 0,
                });
            }
            out[0] = 0;

            let (bx, by, width) = (self.blocks_x(), self.blocks_y(), self.area.width);
            let mut flags = vec![0u8; (2 * bx * by + 3) & !3];
            let mut xor_data = Vec::new();
            for block_y in 0..by {
                for block_x in 0..bx {
                    let x0 = block_x * BLOCK_SIZE;
                    let y0 = block_y * BLOCK_SIZE;
                    let bw = BLOCK_SIZE.min(width - x0);
                    let bh = BLOCK_SIZE.min(self.area.height - y0);
                    let mut changed = false;
                    for y in y0..y0 + bh {
                        let cur = &self.area.row(screen, y)[x0..x0 + bw];
                        let old = &self.prev[y * width + x0..y * width + x0 + bw];
                        if cur != old {
                            changed = true;
                            break;
                        }
                    }
                    if changed {
                        flags[2 * (block_y * bx + block_x)] = 1; // zero motion, XOR data follows
                        for y in y0..y0 + bh {
                            let cur = &self.area.row(screen, y)[x0..x0 + bw];
                            let old = &self.prev[y * width + x0..y * width + x0 + bw];
                            for (c, o) in cur.iter().zip(old) {
                                xor_data.push(c ^ o);
                            }
                        }
                    }
                }
            }
            self.work.clear();
            self.work.extend_from_slice(&flags);
            self.work.extend_from_slice(&xor_data);
            1
        };

        let compressed = self.deflate_frame(&mut out[header_len..])?;
        self.copy_region(screen);
        Ok(header_len + compressed)
    }

    fn end(&mut self) {
        self.prev = Vec::new();
        self.work = Vec::new();
        self.deflate = None;
    }
}
