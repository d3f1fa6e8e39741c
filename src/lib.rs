//! a8export - multimedia export engine for 8-bit Atari emulators
//!
//! The emulator produces paletted framebuffers and PCM audio; this crate
//! serializes them into still images (PCX, PNG), audio files (WAV) and
//! interleaved video recordings (AVI with pluggable codecs).
//!
//! # Architecture
//!
//! - `format`: streaming RIFF container writers (AVI, WAV)
//! - `codec`: pluggable AVI video codecs (MRLE, Motion-PNG, ZMBV)
//! - `image`: single-image writers (PCX, PNG)
//! - `sink`: little-endian primitives shared by all of the above
//! - `screen` / `sound`: framebuffer geometry, palette and PCM formats
//! - `config`: user-facing codec/keyframe/compression options
//!
//! The AVI writer is the core: a twice-written backpatched header, a
//! video/audio interleave state machine, keyframe scheduling with a
//! fractional-millisecond residual, and a byte-exact `idx1` index.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod image;
pub mod screen;
pub mod sink;
pub mod sound;
pub mod stats;

pub use config::ExportConfig;
pub use error::{Error, Result};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
