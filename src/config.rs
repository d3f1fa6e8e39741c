//! Export configuration: codec choice, keyframe interval, compression level
//!
//! The emulator's command-line and config-file front ends parse values and
//! hand them to the validated setters here; the writers read the resulting
//! snapshot at file-open time.

use std::io::{self, Write};

use crate::codec;
use crate::error::{Error, Result};

/// Default interval between video keyframes in milliseconds.
pub const DEFAULT_KEYFRAME_INTERVAL_MS: u32 = 1000;

/// Default zlib/PNG compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// User-selected export options.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Requested codec id; `None` means "best available"
    video_codec: Option<String>,
    keyframe_interval_ms: u32,
    compression_level: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            video_codec: None,
            keyframe_interval_ms: DEFAULT_KEYFRAME_INTERVAL_MS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ExportConfig {
    /// Configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The requested codec id, or `None` for automatic selection.
    pub fn video_codec(&self) -> Option<&str> {
        self.video_codec.as_deref()
    }

    /// Interval between video keyframes in milliseconds.
    pub fn keyframe_interval_ms(&self) -> u32 {
        self.keyframe_interval_ms
    }

    /// zlib/PNG compression level, 0..=9.
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Request a codec by id, or `auto` for the best available one.
    ///
    /// The id match is case-insensitive; the canonical lowercase id is
    /// stored. Unknown ids are fatal argument errors.
    pub fn set_video_codec(&mut self, id: &str) -> Result<()> {
        if id.eq_ignore_ascii_case("auto") {
            self.video_codec = None;
            return Ok(());
        }
        match codec::canonical_id(id) {
            Some(canonical) => {
                self.video_codec = Some(canonical.to_string());
                Ok(())
            }
            None => Err(Error::invalid_argument(format!(
                "unknown video codec '{}'",
                id
            ))),
        }
    }

    /// Set the keyframe interval; must be at least one millisecond.
    pub fn set_keyframe_interval_ms(&mut self, ms: u32) -> Result<()> {
        if ms < 1 {
            return Err(Error::invalid_argument(
                "invalid keyframe interval time, must be 1 millisecond or greater",
            ));
        }
        self.keyframe_interval_ms = ms;
        Ok(())
    }

    /// Set the zlib/PNG compression level; must be between 0 and 9.
    pub fn set_compression_level(&mut self, level: u32) -> Result<()> {
        if level > 9 {
            return Err(Error::invalid_argument(
                "invalid png/zlib compression level - must be between 0 and 9",
            ));
        }
        self.compression_level = level;
        Ok(())
    }

    /// Apply one config-file item. Keys are case-sensitive.
    ///
    /// Returns `Ok(true)` when the key belongs to this module, `Ok(false)`
    /// when it should be offered to other subsystems, and an error when the
    /// key is recognized but the value is invalid.
    pub fn read_config_item(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "VIDEO_CODEC" => {
                self.set_video_codec(value)?;
                Ok(true)
            }
            "VIDEO_CODEC_KEYFRAME_INTERVAL" => {
                let ms = value.parse::<u32>().map_err(|_| {
                    Error::invalid_argument(format!("invalid keyframe interval '{}'", value))
                })?;
                self.set_keyframe_interval_ms(ms)?;
                Ok(true)
            }
            "COMPRESSION_LEVEL" => {
                let level = value.parse::<u32>().map_err(|_| {
                    Error::invalid_argument(format!("invalid compression level '{}'", value))
                })?;
                self.set_compression_level(level)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Emit this module's config-file items.
    pub fn write_config<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match &self.video_codec {
            None => writeln!(w, "VIDEO_CODEC=AUTO")?,
            Some(id) => writeln!(w, "VIDEO_CODEC={}", id)?,
        }
        writeln!(
            w,
            "VIDEO_CODEC_KEYFRAME_INTERVAL={}",
            self.keyframe_interval_ms
        )?;
        writeln!(w, "COMPRESSION_LEVEL={}", self.compression_level)?;
        Ok(())
    }
}
