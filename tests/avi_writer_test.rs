//! End-to-end AVI writer tests
//!
//! Scenarios drive the writer through synthetic codecs, then re-parse the
//! written bytes to check the container against what a conformant reader
//! would see: chunk layout, index offsets, keyframe flags, size fields.

use std::io::{self, Cursor, Seek, SeekFrom, Write};

use a8export::codec::{self, CodecInfo, VideoCodec};
use a8export::config::ExportConfig;
use a8export::error::{Error, Result};
use a8export::format::{AviConfig, AviWriter, MAX_RECORDING_SIZE};
use a8export::screen::{Palette, VideoArea, SCREEN_WIDTH};
use a8export::sound::{AudioFormat, SampleWidth};

// ============================================================================
// Test codecs and sinks
// ============================================================================

static FIXED_INFO: CodecInfo = CodecInfo {
    id: "fixed",
    name: "Fixed-size test codec",
    fourcc: *b"FIXD",
    avi_compression: *b"FIXD",
    uses_interframes: true,
};

/// Codec producing a constant frame size, optionally without touching the
/// output buffer (for ceiling tests where content is irrelevant).
struct FixedSizeCodec {
    size: usize,
    fill: bool,
}

impl VideoCodec for FixedSizeCodec {
    fn info(&self) -> &'static CodecInfo {
        &FIXED_INFO
    }

    fn init(&mut self, _area: VideoArea, _palette: &Palette) -> Result<usize> {
        Ok(self.size.max(16))
    }

    fn frame(&mut self, _screen: &[u8], _keyframe: bool, out: &mut [u8]) -> Result<usize> {
        if self.fill {
            out[..self.size].fill(0x5A);
        }
        Ok(self.size)
    }

    fn end(&mut self) {}
}

/// Position-tracking sink that discards data, so multi-gigabyte ceiling
/// tests need no memory.
struct NullSink {
    pos: u64,
    len: u64,
}

impl NullSink {
    fn new() -> Self {
        NullSink { pos: 0, len: 0 }
    }
}

impl Write for NullSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pos += buf.len() as u64;
        if self.pos > self.len {
            self.len = self.pos;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for NullSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::Current(d) => (self.pos as i64 + d) as u64,
            SeekFrom::End(d) => (self.len as i64 + d) as u64,
        };
        Ok(self.pos)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_area() -> VideoArea {
    VideoArea::new(0, 0, 32, 16).unwrap()
}

fn test_screen() -> Vec<u8> {
    vec![0u8; SCREEN_WIDTH * 16]
}

fn mono8() -> AudioFormat {
    AudioFormat {
        sample_rate: 44100,
        channels: 1,
        width: SampleWidth::U8,
    }
}

fn avi_config(audio: Option<AudioFormat>, fps: f64, keyframe_interval_ms: u32) -> AviConfig {
    AviConfig {
        area: test_area(),
        palette: Palette::grayscale(),
        fps,
        audio,
        keyframe_interval_ms,
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Idx1Entry {
    id: [u8; 4],
    flags: u32,
    offset: u32,
    size: u32,
}

struct ParsedAvi {
    /// Absolute position of the "movi" tag (index offsets count from here)
    movi_tag: usize,
    /// movi LIST payload size, including the tag
    movi_size: usize,
    entries: Vec<Idx1Entry>,
}

/// Walk the top-level RIFF chunks and pull out movi and idx1.
fn parse_avi(bytes: &[u8]) -> ParsedAvi {
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"AVI ");
    assert_eq!(read_u32(bytes, 4) as usize, bytes.len() - 8);

    let mut movi = None;
    let mut entries = Vec::new();
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let tag: [u8; 4] = bytes[pos..pos + 4].try_into().unwrap();
        let size = read_u32(bytes, pos + 4) as usize;
        match &tag {
            b"LIST" if &bytes[pos + 8..pos + 12] == b"movi" => {
                movi = Some((pos + 8, size));
            }
            b"idx1" => {
                assert_eq!(size % 16, 0);
                for i in 0..size / 16 {
                    let at = pos + 8 + i * 16;
                    entries.push(Idx1Entry {
                        id: bytes[at..at + 4].try_into().unwrap(),
                        flags: read_u32(bytes, at + 4),
                        offset: read_u32(bytes, at + 8),
                        size: read_u32(bytes, at + 12),
                    });
                }
            }
            _ => {}
        }
        pos += 8 + size + (size & 1);
    }

    let (movi_tag, movi_size) = movi.expect("no movi LIST found");
    ParsedAvi {
        movi_tag,
        movi_size,
        entries,
    }
}

impl ParsedAvi {
    /// Check every index entry points at the chunk header it describes and
    /// that the chunk sizes add up to the movi payload.
    fn check_index_offsets(&self, bytes: &[u8]) {
        let mut walked = 4usize;
        for entry in &self.entries {
            let at = self.movi_tag + entry.offset as usize;
            assert_eq!(&bytes[at..at + 4], &entry.id, "index offset mismatch");
            assert_eq!(read_u32(bytes, at + 4), entry.size);
            assert_eq!(entry.offset as usize, walked);
            walked += 8 + entry.size as usize + (entry.size as usize & 1);
        }
        assert_eq!(walked, self.movi_size, "movi size mismatch");
    }
}

// ============================================================================
// Keyframe scheduling
// ============================================================================

#[test]
fn test_keyframe_schedule_60fps_1000ms() {
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        Box::new(FixedSizeCodec {
            size: 100,
            fill: true,
        }),
        avi_config(None, 60.0, 1000),
    )
    .unwrap();

    let screen = test_screen();
    for _ in 0..61 {
        writer.add_video_frame(&screen).unwrap();
    }
    let bytes = writer.close().unwrap().into_inner();

    let parsed = parse_avi(&bytes);
    assert_eq!(parsed.entries.len(), 61);
    for (i, entry) in parsed.entries.iter().enumerate() {
        let expect_keyframe = i == 0 || i == 60;
        assert_eq!(
            entry.flags & 0x10 != 0,
            expect_keyframe,
            "frame {} keyframe flag",
            i
        );
    }
    parsed.check_index_offsets(&bytes);
}

#[test]
fn test_first_frame_is_always_keyframe() {
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        Box::new(FixedSizeCodec {
            size: 10,
            fill: true,
        }),
        avi_config(None, 50.0, 60000),
    )
    .unwrap();
    let screen = test_screen();
    for _ in 0..3 {
        writer.add_video_frame(&screen).unwrap();
    }
    let bytes = writer.close().unwrap().into_inner();
    let parsed = parse_avi(&bytes);
    assert!(parsed.entries[0].flags & 0x10 != 0);
    assert!(parsed.entries[1].flags & 0x10 == 0);
}

// ============================================================================
// Interleaving and chunk layout
// ============================================================================

#[test]
fn test_interleaved_audio_layout_with_odd_chunks() {
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        Box::new(FixedSizeCodec {
            size: 101, // odd: forces a video pad byte
            fill: true,
        }),
        avi_config(Some(mono8()), 60.0, 1000),
    )
    .unwrap();

    let screen = test_screen();
    let samples = vec![0x80u8; 735];
    for i in 0..5 {
        // order independence: swap halves every other frame
        if i % 2 == 0 {
            writer.add_video_frame(&screen).unwrap();
            writer.add_audio_samples(&samples, 735).unwrap();
        } else {
            writer.add_audio_samples(&samples, 735).unwrap();
            writer.add_video_frame(&screen).unwrap();
        }
    }
    assert_eq!(writer.frames_written(), 4); // the fifth pair commits on close
    let bytes = writer.close().unwrap().into_inner();

    let parsed = parse_avi(&bytes);
    assert_eq!(parsed.entries.len(), 10);
    for pair in parsed.entries.chunks(2) {
        assert_eq!(&pair[0].id, b"00dc");
        assert_eq!(pair[0].size, 101);
        assert_eq!(&pair[1].id, b"01wb");
        assert_eq!(pair[1].size, 735);
        // PCM audio is always flagged as a keyframe
        assert_eq!(pair[1].flags, 0x10);
    }
    parsed.check_index_offsets(&bytes);

    // odd video chunk is padded on disk but reports its true size
    let first = parsed.movi_tag + 4;
    assert_eq!(&bytes[first..first + 4], b"00dc");
    assert_eq!(read_u32(&bytes, first + 4), 101);
    assert_eq!(bytes[first + 8 + 101], 0);
    assert_eq!(&bytes[first + 8 + 102..first + 8 + 106], b"01wb");
}

#[test]
fn test_samples_written_accumulates() {
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        Box::new(FixedSizeCodec {
            size: 8,
            fill: true,
        }),
        avi_config(Some(mono8()), 60.0, 1000),
    )
    .unwrap();
    let screen = test_screen();
    let samples = vec![0u8; 700];
    for _ in 0..3 {
        writer.add_video_frame(&screen).unwrap();
        writer.add_audio_samples(&samples, 700).unwrap();
    }
    // 3 pairs pushed: 2 committed in-stream so far, 1 commits on close
    assert_eq!(writer.samples_written(), 1400);
    assert_eq!(writer.frames_written(), 2);
    let bytes = writer.close().unwrap().into_inner();
    assert_eq!(parse_avi(&bytes).entries.len(), 6);
}

#[test]
fn test_real_mrle_recording() {
    let config = ExportConfig::new();
    let codec = codec::resolve("mrle", &config).unwrap();
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        codec,
        avi_config(None, 60.0, 1000),
    )
    .unwrap();

    let mut screen = test_screen();
    for i in 0..10u8 {
        screen[5 * SCREEN_WIDTH + 3] = i;
        writer.add_video_frame(&screen).unwrap();
    }
    assert_eq!(writer.samples_written(), 0);
    let bytes = writer.close().unwrap().into_inner();
    let parsed = parse_avi(&bytes);
    assert_eq!(parsed.entries.len(), 10);
    parsed.check_index_offsets(&bytes);
    // the compression tag for MRLE is BI_RLE8
    let strf_tag = bytes.windows(4).position(|w| w == b"strf").unwrap();
    assert_eq!(&bytes[strf_tag + 24..strf_tag + 28], &[1, 0, 0, 0]);
}

#[cfg(feature = "png")]
#[test]
fn test_mpng_is_all_keyframes() {
    let config = ExportConfig::new();
    let codec = codec::resolve("mpng", &config).unwrap();
    assert!(!codec.info().uses_interframes);
    let mut writer = AviWriter::open(
        Cursor::new(Vec::new()),
        codec,
        avi_config(None, 60.0, 1000),
    )
    .unwrap();
    let screen = test_screen();
    for _ in 0..8 {
        writer.add_video_frame(&screen).unwrap();
    }
    let bytes = writer.close().unwrap().into_inner();
    let parsed = parse_avi(&bytes);
    assert_eq!(parsed.entries.len(), 8);
    for entry in &parsed.entries {
        assert_eq!(entry.flags, 0x10);
    }
    parsed.check_index_offsets(&bytes);
}

// ============================================================================
// Size ceiling
// ============================================================================

#[test]
fn test_size_ceiling_stops_recording() {
    let frame_size = 0x3FFFEu64;
    let mut writer = AviWriter::open(
        NullSink::new(),
        Box::new(FixedSizeCodec {
            size: frame_size as usize,
            fill: false,
        }),
        avi_config(None, 60.0, 1000),
    )
    .unwrap();

    let header_size = writer.current_size(); // header plus index chunk header
    let per_frame = frame_size + 8 + 32;
    let expected_frames = (MAX_RECORDING_SIZE - header_size) / per_frame + 1;

    let screen = test_screen();
    let err = loop {
        match writer.add_video_frame(&screen) {
            Ok(()) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(err, Error::SizeLimit));
    assert_eq!(u64::from(writer.frames_written()), expected_frames);
    assert!(writer.current_size() > MAX_RECORDING_SIZE);

    // further pushes keep refusing, close still produces a valid file
    assert!(matches!(
        writer.add_video_frame(&screen),
        Err(Error::SizeLimit)
    ));
    let frames = writer.frames_written();
    let sink = writer.close().unwrap();
    let expected_len = header_size - 8 + frames as u64 * (frame_size + 8) + 8 + frames as u64 * 16;
    assert_eq!(sink.len, expected_len);
}
