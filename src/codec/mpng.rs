//! Motion-PNG video codec
//!
//! Every frame is a complete 8-bit indexed PNG image. There is no delta
//! coding, so every frame is a keyframe regardless of the scheduler.

use crate::codec::{CodecInfo, VideoCodec};
use crate::error::Result;
use crate::image::png::write_png_to_buffer;
use crate::screen::{Palette, VideoArea};

static MPNG_INFO: CodecInfo = CodecInfo {
    id: "mpng",
    name: "Motion-PNG",
    fourcc: *b"MPNG",
    avi_compression: *b"MPNG",
    uses_interframes: false,
};

/// Motion-PNG encoder: the capture region, the palette snapshot, and the
/// configured compression level.
pub struct MpngCodec {
    area: VideoArea,
    palette: Palette,
    compression_level: u32,
}

impl MpngCodec {
    pub fn new(compression_level: u32) -> Self {
        MpngCodec {
            area: VideoArea::full(),
            palette: Palette::grayscale(),
            compression_level,
        }
    }
}

impl VideoCodec for MpngCodec {
    fn info(&self) -> &'static CodecInfo {
        &MPNG_INFO
    }

    fn init(&mut self, area: VideoArea, palette: &Palette) -> Result<usize> {
        self.area = area;
        self.palette = palette.clone();
        // filtered scan lines plus headroom for PLTE, chunk framing and
        // incompressible data
        let raw = (area.width + 1) * area.height;
        Ok(raw + raw / 16 + 4096)
    }

    fn frame(&mut self, screen: &[u8], _keyframe: bool, out: &mut [u8]) -> Result<usize> {
        write_png_to_buffer(self.area, &self.palette, screen, self.compression_level, out)
    }

    fn end(&mut self) {}
}
