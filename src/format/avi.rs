//! Streaming RIFF/AVI writer with codec-driven video and PCM audio
//!
//! The header is written twice: a prospective copy at open time so data
//! can stream behind it, and a final copy on close carrying the totals
//! that only exist once every chunk is on disk. Between the two, video
//! and audio arrive in pairs through a small interleave state machine,
//! each committed frame is remembered for the `idx1` index, and a running
//! byte count enforces the 32-bit RIFF size ceiling.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tracing::{error, info};

use crate::codec::VideoCodec;
use crate::error::{Error, Result};
use crate::format::MAX_RECORDING_SIZE;
use crate::screen::{Palette, VideoArea};
use crate::sink::ByteSink;
use crate::sound::AudioFormat;
use crate::stats::VideoStats;

/// The index vector grows in steps of this many frames.
const FRAME_INDEX_ALLOC: usize = 1000;

/// AVIIF_KEYFRAME in idx1 flags.
const INDEX_KEYFRAME: u32 = 0x10;

/// Recording parameters fixed at open time.
#[derive(Clone)]
pub struct AviConfig {
    /// Captured region of the framebuffer
    pub area: VideoArea,
    /// Palette snapshot for the whole recording
    pub palette: Palette,
    /// Emulator frame rate (50 for PAL, just under 60 for NTSC)
    pub fps: f64,
    /// PCM format, or `None` for a video-only file
    pub audio: Option<AudioFormat>,
    /// Interval between keyframes in milliseconds
    pub keyframe_interval_ms: u32,
}

/// One half of the current interleave pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Nothing buffered for this stream yet
    Empty,
    /// Encoded bytes (video) or sample count (audio) awaiting the pair
    Buffered(usize),
    /// A codec or buffer failure poisoned this stream
    Failed,
}

impl Pending {
    fn is_buffered(self) -> bool {
        matches!(self, Pending::Buffered(_))
    }

    fn is_failed(self) -> bool {
        self == Pending::Failed
    }
}

/// Per-frame record for the end-of-file index.
#[derive(Debug, Clone, Copy)]
struct FrameIndexEntry {
    video_size: u32,
    audio_size: u32,
    keyframe: bool,
}

/// Streaming AVI writer over a seekable byte stream.
pub struct AviWriter<W: Write + Seek> {
    sink: ByteSink<W>,
    codec: Box<dyn VideoCodec>,
    area: VideoArea,
    palette: Palette,
    fps: f64,
    audio: Option<AudioFormat>,
    keyframe_interval_ms: u32,
    description: String,

    size_riff: u32,
    size_movi: u32,
    movi_pos: u64,

    frames_written: u32,
    samples_written: u32,
    bytes_written: u64,

    pending_video: Pending,
    pending_audio: Pending,
    video_buffer: Vec<u8>,
    audio_buffer: Vec<u8>,
    frame_indexes: Vec<FrameIndexEntry>,

    // single precision on purpose: the scheduler's crossing points depend
    // on the residual rounding of float accumulation
    keyframe_residual: f32,
    current_is_keyframe: bool,
    limit_reached: bool,

    stats: VideoStats,
}

impl AviWriter<BufWriter<File>> {
    /// Create an AVI file on disk.
    pub fn create<P: AsRef<Path>>(
        path: P,
        codec: Box<dyn VideoCodec>,
        config: AviConfig,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Self::open(BufWriter::new(file), codec, config)
    }
}

impl<W: Write + Seek> AviWriter<W> {
    /// Initialize the codec, write the prospective header and return the
    /// open writer. The palette is snapshotted here; it must not change
    /// for the file's lifetime.
    pub fn open(writer: W, mut codec: Box<dyn VideoCodec>, config: AviConfig) -> Result<Self> {
        if !(config.fps > 0.0) {
            return Err(Error::invalid_argument("frame rate must be positive"));
        }
        if config.keyframe_interval_ms < 1 {
            return Err(Error::invalid_argument(
                "invalid keyframe interval time, must be 1 millisecond or greater",
            ));
        }

        let video_buffer_size = codec.init(config.area, &config.palette)?;
        let audio_buffer = match config.audio {
            Some(format) => {
                let per_frame =
                    (f64::from(format.byte_rate()) / config.fps).ceil() as usize + 1024;
                vec![0u8; per_frame]
            }
            None => Vec::new(),
        };
        let description = format!("AVI {}", codec.info().id);

        let mut writer = AviWriter {
            sink: ByteSink::new(writer),
            codec,
            area: config.area,
            palette: config.palette,
            fps: config.fps,
            audio: config.audio,
            keyframe_interval_ms: config.keyframe_interval_ms,
            description,
            size_riff: 0,
            size_movi: 0,
            movi_pos: 0,
            frames_written: 0,
            samples_written: 0,
            bytes_written: 0,
            pending_video: Pending::Empty,
            pending_audio: Pending::Empty,
            video_buffer: vec![0u8; video_buffer_size],
            audio_buffer,
            frame_indexes: Vec::with_capacity(FRAME_INDEX_ALLOC),
            keyframe_residual: 0.0,
            current_is_keyframe: true, // the first frame is always a keyframe
            limit_reached: false,
            stats: VideoStats::new(),
        };
        writer.write_header()?;
        // current position plus the index chunk header counts against the
        // size ceiling from the start
        writer.bytes_written = writer.sink.tell()? + 8;
        Ok(writer)
    }

    fn num_streams(&self) -> u32 {
        if self.audio.is_some() {
            2
        } else {
            1
        }
    }

    /// Write the header tree at offset 0: RIFF, `hdrl` with `avih` and one
    /// `strl` per stream, then the `movi` LIST header. Called with zeroed
    /// sizes at open and with final values on close; both passes must land
    /// on the same length.
    fn write_header(&mut self) -> Result<()> {
        let width = self.area.width as u32;
        let height = self.area.height as u32;
        let fourcc = self.codec.info().fourcc;
        let compression = self.codec.info().avi_compression;
        let audio = self.audio;
        let num_streams = self.num_streams();
        let frames_written = self.frames_written;
        let samples_written = self.samples_written;
        let size_riff = self.size_riff;
        let size_movi = self.size_movi;

        let video_strl_payload: u32 = 4 + 8 + 56 + 8 + 40 + 256 * 4 + 8 + 16;
        let audio_strl_payload: u32 = 4 + 8 + 56 + 8 + 18 + 8 + 12;
        let mut list_size: u32 = 4 + 8 + 56 + 8 + video_strl_payload;
        if audio.is_some() {
            list_size += 8 + audio_strl_payload;
        }

        let sink = &mut self.sink;
        sink.seek(0)?;

        sink.put_fourcc(b"RIFF")?;
        sink.put_u32_le(size_riff)?; // entire file minus 8, patched on close
        sink.put_fourcc(b"AVI ")?;

        sink.put_fourcc(b"LIST")?;
        sink.put_u32_le(list_size)?;
        sink.put_fourcc(b"hdrl")?;

        sink.put_fourcc(b"avih")?;
        sink.put_u32_le(56)?;
        sink.put_u32_le((1_000_000.0 / self.fps) as u32)?; // microseconds per frame
        sink.put_u32_le(width * height * 3)?; // approximate data rate; readers ignore it
        sink.put_u32_le(0)?; // padding granularity
        sink.put_u32_le(0x10)?; // AVIF_HASINDEX
        sink.put_u32_le(frames_written)?;
        sink.put_u32_le(0)?; // initial frames
        sink.put_u32_le(num_streams)?;
        sink.put_u32_le(width * height * 3)?; // suggested buffer size
        sink.put_u32_le(width)?;
        sink.put_u32_le(height)?;
        sink.put_u32_le(0)?; // reserved
        sink.put_u32_le(0)?;
        sink.put_u32_le(0)?;
        sink.put_u32_le(0)?;

        // video stream headers
        sink.put_fourcc(b"LIST")?;
        sink.put_u32_le(video_strl_payload)?;
        sink.put_fourcc(b"strl")?;

        sink.put_fourcc(b"strh")?;
        sink.put_u32_le(56)?;
        sink.put_fourcc(b"vids")?;
        sink.put_fourcc(&fourcc)?;
        sink.put_u32_le(0)?; // flags
        sink.put_u16_le(0)?; // priority
        sink.put_u16_le(0)?; // language
        sink.put_u32_le(0)?; // initial frames
        sink.put_u32_le(1_000_000)?; // scale
        sink.put_u32_le((self.fps * 1_000_000.0) as u32)?; // rate
        sink.put_u32_le(0)?; // start
        sink.put_u32_le(frames_written)?; // length in frames
        sink.put_u32_le(width * height * 3)?; // suggested buffer size
        sink.put_u32_le(0)?; // quality
        sink.put_u32_le(0)?; // sample size (variable)
        sink.put_u32_le(0)?; // rcFrame
        sink.put_u32_le(0)?;

        sink.put_fourcc(b"strf")?;
        sink.put_u32_le(40 + 256 * 4)?;
        sink.put_u32_le(40)?; // BITMAPINFOHEADER size
        sink.put_u32_le(width)?;
        sink.put_u32_le(height)?;
        sink.put_u16_le(1)?; // planes
        sink.put_u16_le(8)?; // bits per pixel: paletted
        sink.put_fourcc(&compression)?;
        sink.put_u32_le(width * height * 3)?; // image size
        sink.put_u32_le(0)?; // pixels per meter
        sink.put_u32_le(0)?;
        sink.put_u32_le(256)?; // colors used
        sink.put_u32_le(0)?; // colors important (all)
        for i in 0..=255u8 {
            let (r, g, b) = self.palette.rgb(i);
            sink.put_u8(b)?;
            sink.put_u8(g)?;
            sink.put_u8(r)?;
            sink.put_u8(0)?;
        }

        sink.put_fourcc(b"strn")?;
        sink.put_u32_le(16)?;
        sink.put_bytes(b"atari800 video\0\0")?;

        if let Some(format) = audio {
            sink.put_fourcc(b"LIST")?;
            sink.put_u32_le(audio_strl_payload)?;
            sink.put_fourcc(b"strl")?;

            sink.put_fourcc(b"strh")?;
            sink.put_u32_le(56)?;
            sink.put_fourcc(b"auds")?;
            sink.put_u32_le(1)?; // handler: uncompressed
            sink.put_u32_le(0)?; // flags
            sink.put_u16_le(0)?; // priority
            sink.put_u16_le(0)?; // language
            sink.put_u32_le(0)?; // initial frames
            sink.put_u32_le(1)?; // scale
            sink.put_u32_le(format.sample_rate)?; // rate
            sink.put_u32_le(0)?; // start
            sink.put_u32_le(samples_written)?; // length in samples
            sink.put_u32_le(format.byte_rate())?; // suggested buffer size
            sink.put_u32_le(0)?; // quality
            sink.put_u32_le(u32::from(format.block_align()))?; // sample size
            sink.put_u32_le(0)?; // rcFrame
            sink.put_u32_le(0)?;

            sink.put_fourcc(b"strf")?;
            sink.put_u32_le(18)?;
            sink.put_u16_le(1)?; // PCM
            sink.put_u16_le(format.channels)?;
            sink.put_u32_le(format.sample_rate)?;
            sink.put_u32_le(format.byte_rate())?;
            sink.put_u16_le(format.block_align())?;
            sink.put_u16_le(format.width.bits())?;
            sink.put_u16_le(0)?; // extension size

            sink.put_fourcc(b"strn")?;
            sink.put_u32_le(12)?;
            sink.put_bytes(b"POKEY audio\0")?;
        }

        sink.put_fourcc(b"LIST")?;
        sink.put_u32_le(size_movi)?; // all audio/video chunks, patched on close
        self.movi_pos = sink.tell()?;
        sink.put_fourcc(b"movi")?;

        if sink.tell()? != u64::from(12 + 8 + list_size + 12) {
            return Err(Error::protocol("AVI header landed at the wrong offset"));
        }
        Ok(())
    }

    /// Write the buffered video/audio pair as `00dc`/`01wb` chunks,
    /// remember the index entry and advance the keyframe scheduler.
    fn commit_frame(&mut self) -> Result<()> {
        match self.commit_frame_inner() {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("AVI write error: {}", e);
                self.pending_video = Pending::Failed;
                self.pending_audio = Pending::Failed;
                Err(e)
            }
        }
    }

    fn commit_frame_inner(&mut self) -> Result<()> {
        let video_size = match self.pending_video {
            Pending::Buffered(size) => size,
            _ => return Err(Error::protocol("commit without a buffered video frame")),
        };

        let start = self.sink.tell()?;
        let video_padding = video_size & 1;
        self.sink.put_fourcc(b"00dc")?;
        self.sink.put_u32_le(video_size as u32)?;
        self.sink.put_bytes(&self.video_buffer[..video_size])?;
        if video_padding != 0 {
            self.sink.put_u8(0)?;
        }
        let mut expected = 8 + video_size + video_padding;

        let mut audio_size = 0usize;
        if let Some(format) = self.audio {
            let num_samples = match self.pending_audio {
                Pending::Buffered(samples) => samples,
                _ => return Err(Error::protocol("commit without buffered audio samples")),
            };
            audio_size = num_samples * format.width.bytes();
            let audio_padding = audio_size & 1;
            self.sink.put_fourcc(b"01wb")?;
            self.sink.put_u32_le(audio_size as u32)?;
            self.sink
                .put_samples_le(&self.audio_buffer[..audio_size], format.width, num_samples)?;
            if audio_padding != 0 {
                self.sink.put_u8(0)?;
            }
            self.samples_written += num_samples as u32;
            expected += 8 + audio_size + audio_padding;
        }

        if self.frame_indexes.len() == self.frame_indexes.capacity() {
            self.frame_indexes.reserve(FRAME_INDEX_ALLOC);
        }
        self.frame_indexes.push(FrameIndexEntry {
            video_size: video_size as u32,
            audio_size: audio_size as u32,
            keyframe: self.current_is_keyframe,
        });
        self.frames_written += 1;

        // the file must have advanced by exactly the computed chunk total
        let written = self.sink.tell()? - start;
        if written != expected as u64 {
            return Err(Error::protocol(format!(
                "frame wrote {} bytes, expected {}",
                written, expected
            )));
        }

        // frame data plus both 16-byte index entries; kept at 32 even for
        // single-stream files to match the original's conservative count
        self.bytes_written += written + 32;
        self.stats.record(video_size as u32);

        if self.codec.info().uses_interframes {
            self.keyframe_residual =
                (f64::from(self.keyframe_residual) + 1000.0 / self.fps) as f32;
            let interval = self.keyframe_interval_ms as f32;
            if self.keyframe_residual > interval {
                self.current_is_keyframe = true;
                self.keyframe_residual -= (self.keyframe_residual / interval).floor() * interval;
            } else {
                self.current_is_keyframe = false;
            }
        } else {
            self.current_is_keyframe = true;
        }

        self.pending_video = Pending::Empty;
        self.pending_audio = Pending::Empty;

        if self.bytes_written > MAX_RECORDING_SIZE {
            self.limit_reached = true;
        }
        Ok(())
    }

    /// Push one video frame.
    ///
    /// Video and audio for the same logical frame may arrive in either
    /// order, but the pair must complete before either kind repeats. When
    /// a pair is already buffered it is committed first; the commit that
    /// crosses the size ceiling completes on disk and this call then fails
    /// with [`Error::SizeLimit`] without consuming the new frame.
    pub fn add_video_frame(&mut self, screen: &[u8]) -> Result<()> {
        if self.limit_reached {
            return Err(Error::SizeLimit);
        }
        if self.pending_video.is_failed() || self.pending_audio.is_failed() {
            return Err(Error::protocol("writer is in a failed state"));
        }
        if self.pending_video.is_buffered() {
            if self.audio.is_none() || self.pending_audio.is_buffered() {
                self.commit_frame()?;
                if self.limit_reached {
                    return Err(Error::SizeLimit);
                }
            } else {
                error!("AVI write error: attempted to write video frame without audio data");
                return Err(Error::protocol(
                    "video frame pushed twice without audio samples",
                ));
            }
        }

        let keyframe = self.current_is_keyframe;
        match self.codec.frame(screen, keyframe, &mut self.video_buffer) {
            Ok(size) => {
                self.pending_video = Pending::Buffered(size);
                Ok(())
            }
            Err(e) => {
                error!("AVI write error: {}", e);
                self.pending_video = Pending::Failed;
                Err(e)
            }
        }
    }

    /// Push the PCM samples belonging to the current video frame.
    pub fn add_audio_samples(&mut self, buf: &[u8], num_samples: usize) -> Result<()> {
        let format = match self.audio {
            Some(format) => format,
            None => {
                return Err(Error::protocol(
                    "audio samples pushed to a video-only recording",
                ))
            }
        };
        if self.limit_reached {
            return Err(Error::SizeLimit);
        }
        if self.pending_video.is_failed() || self.pending_audio.is_failed() {
            return Err(Error::protocol("writer is in a failed state"));
        }
        if self.pending_audio.is_buffered() {
            if self.pending_video.is_buffered() {
                self.commit_frame()?;
                if self.limit_reached {
                    return Err(Error::SizeLimit);
                }
            } else {
                error!("AVI write error: attempted to write audio data without video frame");
                return Err(Error::protocol(
                    "audio samples pushed twice without a video frame",
                ));
            }
        }

        let size = num_samples * format.width.bytes();
        if size > self.audio_buffer.len() {
            error!(
                "AVI write error: audio buffer size too small to hold {} samples",
                num_samples
            );
            self.pending_audio = Pending::Failed;
            return Err(Error::BufferOverflow {
                need: size,
                have: self.audio_buffer.len(),
            });
        }
        if buf.len() < size {
            return Err(Error::invalid_argument(
                "sample buffer shorter than the sample count",
            ));
        }
        self.audio_buffer[..size].copy_from_slice(&buf[..size]);
        self.pending_audio = Pending::Buffered(num_samples);
        Ok(())
    }

    /// Write the `idx1` chunk: one 16-byte entry per stream per frame,
    /// offsets measured from the start of the `movi` payload.
    fn write_index(&mut self) -> Result<()> {
        if self.frames_written == 0 {
            return Err(Error::protocol("no frames written"));
        }
        let start = self.sink.tell()?;
        let index_size = self.frames_written * 16 * self.num_streams();
        self.sink.put_fourcc(b"idx1")?;
        self.sink.put_u32_le(index_size)?;

        let two_streams = self.audio.is_some();
        // 4 accounts for the "movi" tag itself inside the LIST payload
        let mut offset: u32 = 4;
        for entry in &self.frame_indexes {
            self.sink.put_fourcc(b"00dc")?;
            self.sink
                .put_u32_le(if entry.keyframe { INDEX_KEYFRAME } else { 0 })?;
            self.sink.put_u32_le(offset)?;
            self.sink.put_u32_le(entry.video_size)?;
            offset += entry.video_size + 8 + (entry.video_size & 1);

            if two_streams {
                self.sink.put_fourcc(b"01wb")?;
                self.sink.put_u32_le(INDEX_KEYFRAME)?; // PCM is always a keyframe
                self.sink.put_u32_le(offset)?;
                self.sink.put_u32_le(entry.audio_size)?;
                offset += entry.audio_size + 8 + (entry.audio_size & 1);
            }
        }

        let written = self.sink.tell()? - start;
        if written != u64::from(8 + index_size) {
            return Err(Error::protocol("index size mismatch"));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.size_movi = (self.sink.tell()? - self.movi_pos) as u32;
        self.write_index()?;
        self.size_riff = (self.sink.tell()? - 8) as u32;
        self.write_header()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Commit a complete pending pair, write the index, rewrite the header
    /// with final totals and flush, returning the underlying stream.
    ///
    /// A half-buffered pair is dropped. The codec and buffers are released
    /// on every path; a reported failure still leaves the stream closed.
    pub fn close(mut self) -> Result<W> {
        let mut result = Ok(());
        if self.pending_video.is_buffered()
            && (self.audio.is_none() || self.pending_audio.is_buffered())
        {
            result = self.commit_frame();
        }

        if self.frames_written > 0 {
            let seconds = (f64::from(self.frames_written) / self.fps) as u64;
            info!(
                "AVI stats: {}:{:02}:{:02}, {}MB, {} frames; video codec avg frame size {:.1}kB, min={:.1}kB, max={:.1}kB",
                seconds / 3600,
                (seconds / 60) % 60,
                seconds % 60,
                self.bytes_written / 1024 / 1024,
                self.frames_written,
                self.stats.average(self.frames_written) / 1024.0,
                f64::from(self.stats.smallest_video_frame) / 1024.0,
                f64::from(self.stats.largest_video_frame) / 1024.0,
            );
        }

        if result.is_ok() {
            result = self.finalize();
            if let Err(e) = &result {
                error!("AVI write error: {}", e);
            }
        }

        self.codec.end();
        self.video_buffer = Vec::new();
        self.audio_buffer = Vec::new();
        self.frame_indexes = Vec::new();

        result.map(|()| self.sink.into_inner())
    }

    /// Number of committed frames.
    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Number of committed audio samples.
    pub fn samples_written(&self) -> u32 {
        self.samples_written
    }

    /// Duration of the recording so far in whole seconds.
    pub fn elapsed_time(&self) -> u64 {
        (f64::from(self.frames_written) / self.fps) as u64
    }

    /// Approximate file size so far, including index reservations.
    pub fn current_size(&self) -> u64 {
        self.bytes_written
    }

    /// Short format tag for the status display, e.g. `AVI zmbv`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Frame size statistics so far.
    pub fn video_stats(&self) -> &VideoStats {
        &self.stats
    }
}
