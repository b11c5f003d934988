use clap::Parser;
use std::path::PathBuf;

use echolight::config::{self, Backend};
use echolight::dsp::WindowKind;

#[derive(Parser, Debug)]
#[command(name = "echolight", about = "Scrolling spectrogram renderer for an audio stream")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "sweep.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to echolight.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Frames per analysis block (power of two)
    #[arg(short = 'n', long, default_value_t = config::default_block_length())]
    pub block_length: usize,

    /// Taper applied to each block before the transform
    #[arg(long, value_enum, default_value_t = WindowKind::BlackmanHarris)]
    pub window: WindowKind,

    /// Source channel to analyze (0-based)
    #[arg(long, default_value_t = 0)]
    pub channel: usize,

    /// Pixel columns of history in the sweep
    #[arg(short, long, default_value_t = config::default_sweep_width())]
    pub width: usize,

    /// Magnitude rendered at full intensity
    #[arg(short, long, default_value_t = config::default_saturation())]
    pub saturation: f32,

    /// Where the shift-and-insert runs
    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    pub backend: Backend,

    /// Compositor ticks per second
    #[arg(long, default_value_t = config::default_fps())]
    pub fps: u32,

    /// Interleave producer and consumer on one thread for a reproducible render
    #[arg(long)]
    pub offline: bool,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = config::default_crf())]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,
}

impl Cli {
    /// Fold a config file in; a value only applies where the flag was left at its default.
    pub fn merge(&mut self, cfg: config::Config) {
        if self.block_length == config::default_block_length() {
            self.block_length = cfg.analysis.block_length;
        }
        if self.window == WindowKind::BlackmanHarris {
            self.window = cfg.analysis.window;
        }
        if self.channel == 0 {
            self.channel = cfg.analysis.channel_index;
        }
        if self.width == config::default_sweep_width() {
            self.width = cfg.sweep.width;
        }
        if self.saturation == config::default_saturation() {
            self.saturation = cfg.sweep.saturation_amplitude;
        }
        if self.backend == Backend::Cpu {
            self.backend = cfg.sweep.backend;
        }
        if self.fps == config::default_fps() {
            self.fps = cfg.output.fps;
        }
        if self.crf == config::default_crf() {
            self.crf = cfg.output.crf;
        }
        if self.codec == config::default_codec() {
            self.codec = cfg.output.codec;
        }
        if self.pix_fmt == config::default_pix_fmt() {
            self.pix_fmt = cfg.output.pix_fmt;
        }
    }

    /// The effective settings as a config, for validation.
    pub fn to_config(&self) -> config::Config {
        let mut cfg = config::Config::default();
        cfg.analysis.block_length = self.block_length;
        cfg.analysis.channel_index = self.channel;
        cfg.analysis.window = self.window;
        cfg.sweep.width = self.width;
        cfg.sweep.saturation_amplitude = self.saturation;
        cfg.sweep.backend = self.backend;
        cfg.output.fps = self.fps;
        cfg.output.crf = self.crf;
        cfg.output.codec = self.codec.clone();
        cfg.output.pix_fmt = self.pix_fmt.clone();
        cfg
    }
}
