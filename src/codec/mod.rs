//! Video codec interface and registry
//!
//! Codecs are pluggable: the AVI writer drives them through [`VideoCodec`]
//! and never interprets their output bytes. MRLE is always compiled in;
//! Motion-PNG and ZMBV come and go with the `png` and `zmbv` cargo
//! features, and absent codecs are neither listed nor resolvable.

pub mod mrle;

#[cfg(feature = "png")]
pub mod mpng;

#[cfg(feature = "zmbv")]
pub mod zmbv;

pub use mrle::MrleCodec;

#[cfg(feature = "png")]
pub use mpng::MpngCodec;

#[cfg(feature = "zmbv")]
pub use zmbv::ZmbvCodec;

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::screen::{Palette, VideoArea};

/// Immutable codec metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    /// Codec identifier used on the command line and in config files
    pub id: &'static str,
    /// Descriptive name
    pub name: &'static str,
    /// Stream handler FourCC written into `strh`
    pub fourcc: [u8; 4],
    /// Compression tag written into the `strf` BITMAPINFOHEADER
    pub avi_compression: [u8; 4],
    /// Whether the codec can encode deltas against the previous frame
    pub uses_interframes: bool,
}

/// A pluggable video encoder.
///
/// Lifecycle: `init` once per recording, `frame` per committed frame,
/// `end` on close. `init` returns the maximum bytes one encoded frame can
/// occupy; the caller allocates that buffer once and passes it to every
/// `frame` call.
pub trait VideoCodec {
    /// Static metadata for this codec.
    fn info(&self) -> &'static CodecInfo;

    /// Prepare for a recording over the given region; returns the
    /// per-frame output buffer size.
    fn init(&mut self, area: VideoArea, palette: &Palette) -> Result<usize>;

    /// Encode one frame from the full-stride framebuffer into `out`,
    /// returning the number of bytes produced. Zero is legal and means an
    /// empty inter-frame. When [`CodecInfo::uses_interframes`] is false the
    /// `keyframe` request is ignored and every frame is a keyframe.
    fn frame(&mut self, screen: &[u8], keyframe: bool, out: &mut [u8]) -> Result<usize>;

    /// Release codec-owned resources.
    fn end(&mut self);
}

/// Ids of all compiled-in codecs, in registry order.
pub fn list_ids() -> &'static [&'static str] {
    &[
        "mrle",
        #[cfg(feature = "png")]
        "mpng",
        #[cfg(feature = "zmbv")]
        "zmbv",
    ]
}

/// Resolve an id (case-insensitively) to its canonical registry form.
pub fn canonical_id(id: &str) -> Option<&'static str> {
    list_ids()
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(id))
}

/// Id of the codec `auto` resolves to.
///
/// ZMBV is the default when deflate is available because compressed ZMBV
/// is far superior to the others; otherwise MRLE. Motion-PNG is never the
/// default.
pub fn default_codec_id() -> &'static str {
    #[cfg(feature = "zmbv")]
    {
        "zmbv"
    }
    #[cfg(not(feature = "zmbv"))]
    {
        "mrle"
    }
}

/// Instantiate a codec by id. Unknown ids are fatal argument errors.
pub fn create_codec(id: &str, config: &ExportConfig) -> Result<Box<dyn VideoCodec>> {
    match canonical_id(id) {
        Some("mrle") => Ok(Box::new(MrleCodec::new())),
        #[cfg(feature = "png")]
        Some("mpng") => Ok(Box::new(MpngCodec::new(config.compression_level()))),
        #[cfg(feature = "zmbv")]
        Some("zmbv") => Ok(Box::new(ZmbvCodec::new(config.compression_level()))),
        _ => Err(Error::invalid_argument(format!(
            "unknown video codec '{}'",
            id
        ))),
    }
}

/// Instantiate the codec a request names, with `auto` picking the best
/// available one.
pub fn resolve(request: &str, config: &ExportConfig) -> Result<Box<dyn VideoCodec>> {
    if request.eq_ignore_ascii_case("auto") {
        create_codec(default_codec_id(), config)
    } else {
        create_codec(request, config)
    }
}
