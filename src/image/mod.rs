//! Still-image writers for screenshots
//!
//! PCX needs no external dependencies; PNG delegates compression to the
//! `png` crate and is only compiled with the `png` feature.

pub mod pcx;

#[cfg(feature = "png")]
pub mod png;

pub use pcx::write_pcx;

#[cfg(feature = "png")]
pub use png::{write_png, write_png_to_buffer};
