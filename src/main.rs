//! a8export CLI - exercise the export engine with synthetic content
//!
//! Records test-pattern AVI/WAV files and screenshots so the output can be
//! checked in real media players without running an emulator.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

use a8export::codec;
use a8export::config::ExportConfig;
use a8export::format::{AviConfig, AviWriter, WavWriter};
use a8export::image;
use a8export::screen::{Palette, VideoArea, SCREEN_HEIGHT, SCREEN_WIDTH};
use a8export::sound::{AudioFormat, SampleWidth};

#[derive(Parser)]
#[command(name = "a8export")]
#[command(about = "Multimedia export engine demo recorder", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List compiled-in video codecs
    Codecs,

    /// Record a synthetic test-pattern AVI
    Demo {
        /// Output file path
        output: PathBuf,

        /// Number of frames to record
        #[arg(long, default_value_t = 300)]
        frames: u32,

        /// Video codec id, or auto for the best available
        #[arg(long = "videocodec", default_value = "auto")]
        videocodec: String,

        /// Interval between video keyframes in milliseconds
        #[arg(long = "keyframe-interval", default_value_t = 1000)]
        keyframe_interval: u32,

        /// zlib/PNG compression level 0-9
        #[arg(long = "compression-level", default_value_t = 6)]
        compression_level: u32,

        /// Record video only
        #[arg(long)]
        no_audio: bool,

        /// Use PAL timing (50 Hz) instead of NTSC
        #[arg(long)]
        pal: bool,
    },

    /// Record a synthetic tone as WAV
    WavDemo {
        /// Output file path
        output: PathBuf,

        /// Duration in video frames
        #[arg(long, default_value_t = 300)]
        frames: u32,
    },

    /// Write a test-pattern screenshot (PCX, or PNG with --png)
    Screenshot {
        /// Output file path
        output: PathBuf,

        /// Write PNG instead of PCX
        #[arg(long)]
        png: bool,

        /// zlib/PNG compression level 0-9
        #[arg(long = "compression-level", default_value_t = 6)]
        compression_level: u32,
    },
}

const FPS_NTSC: f64 = 59.9227434;
const FPS_PAL: f64 = 49.8607597;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Codecs => {
            for id in codec::list_ids() {
                println!("{}", id);
            }
            println!("auto -> {}", codec::default_codec_id());
            Ok(())
        }
        Commands::Demo {
            output,
            frames,
            videocodec,
            keyframe_interval,
            compression_level,
            no_audio,
            pal,
        } => {
            let mut config = ExportConfig::new();
            config.set_video_codec(&videocodec)?;
            config.set_keyframe_interval_ms(keyframe_interval)?;
            config.set_compression_level(compression_level)?;
            record_demo(&output, frames, &config, no_audio, pal)
        }
        Commands::WavDemo { output, frames } => record_wav_demo(&output, frames),
        Commands::Screenshot {
            output,
            png,
            compression_level,
        } => {
            let screen = test_frame(0);
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let writer = BufWriter::new(file);
            if png {
                #[cfg(feature = "png")]
                {
                    image::write_png(
                        writer,
                        VideoArea::full(),
                        &test_palette(),
                        &screen,
                        None,
                        compression_level,
                    )?;
                    info!("wrote PNG screenshot to {}", output.display());
                    return Ok(());
                }
                #[cfg(not(feature = "png"))]
                anyhow::bail!("PNG support was not compiled in");
            }
            let _ = compression_level;
            image::write_pcx(writer, VideoArea::full(), &test_palette(), &screen, None)?;
            info!("wrote PCX screenshot to {}", output.display());
            Ok(())
        }
    }
}

/// Hue-ramp palette that makes the test pattern legible.
fn test_palette() -> Palette {
    let mut entries = [(0u8, 0u8, 0u8); 256];
    for (i, e) in entries.iter_mut().enumerate() {
        let v = i as u8;
        *e = (v, v.wrapping_mul(3), v.wrapping_mul(7));
    }
    Palette::from_rgb(entries)
}

/// Full-stride framebuffer with a pattern that scrolls over time.
fn test_frame(tick: u32) -> Vec<u8> {
    let mut screen = vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT];
    for y in 0..SCREEN_HEIGHT {
        for x in 0..SCREEN_WIDTH {
            screen[y * SCREEN_WIDTH + x] = ((x + tick as usize) ^ y) as u8;
        }
    }
    screen
}

/// One video frame's worth of a 440 Hz square wave, 8-bit mono.
fn test_tone(format: AudioFormat, fps: f64, tick: u32) -> Vec<u8> {
    let samples = (f64::from(format.sample_rate) / fps) as usize;
    let start = u64::from(tick) * samples as u64;
    (0..samples)
        .map(|i| {
            let t = start + i as u64;
            let phase = (t * 440 * 2 / u64::from(format.sample_rate)) % 2;
            if phase == 0 {
                0x50
            } else {
                0xB0
            }
        })
        .collect()
}

fn record_demo(
    output: &PathBuf,
    frames: u32,
    config: &ExportConfig,
    no_audio: bool,
    pal: bool,
) -> anyhow::Result<()> {
    let fps = if pal { FPS_PAL } else { FPS_NTSC };
    let audio = (!no_audio).then_some(AudioFormat {
        sample_rate: 44100,
        channels: 1,
        width: SampleWidth::U8,
    });
    let codec = codec::resolve(config.video_codec().unwrap_or("auto"), config)?;
    info!("recording {} frames with codec {}", frames, codec.info().id);

    let avi_config = AviConfig {
        area: VideoArea::full(),
        palette: test_palette(),
        fps,
        audio,
        keyframe_interval_ms: config.keyframe_interval_ms(),
    };
    let mut writer = AviWriter::create(output, codec, avi_config)
        .with_context(|| format!("creating {}", output.display()))?;

    for tick in 0..frames {
        writer.add_video_frame(&test_frame(tick))?;
        if let Some(format) = audio {
            let tone = test_tone(format, fps, tick);
            writer.add_audio_samples(&tone, tone.len())?;
        }
    }

    info!(
        "{}: {} s recorded, ~{} bytes",
        writer.description(),
        writer.elapsed_time(),
        writer.current_size()
    );
    writer.close()?;
    Ok(())
}

fn record_wav_demo(output: &PathBuf, frames: u32) -> anyhow::Result<()> {
    let format = AudioFormat {
        sample_rate: 44100,
        channels: 1,
        width: SampleWidth::U8,
    };
    let mut writer = WavWriter::create(output, format, FPS_NTSC)
        .with_context(|| format!("creating {}", output.display()))?;
    for tick in 0..frames {
        let tone = test_tone(format, FPS_NTSC, tick);
        writer.write_samples(&tone, tone.len())?;
    }
    info!("WAV: {} s recorded", writer.elapsed_time());
    writer.close()?;
    Ok(())
}
