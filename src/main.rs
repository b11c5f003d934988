mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use cli::Cli;
use echolight::audio::{self, SpectrumAnalyzer};
use echolight::config::{self, Backend};
use echolight::encode::ffmpeg::{EncoderSettings, FfmpegEncoder};
use echolight::host;
use echolight::render::{CpuSweep, GpuContext, GpuSweep, SpectrogramCompositor, SweepComposer};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Explicit --config path, or auto-detect echolight.toml / per-user config
    let config_path = cli.config.clone().or_else(config::find_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            cli.merge(cfg);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let settings = cli.to_config();
    settings.validate()?;

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("echolight - scrolling spectrogram renderer");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!(
        "Block: {} frames ({:?} window), sweep width {}, {}fps, {:?} backend",
        settings.analysis.block_length,
        settings.analysis.window,
        settings.sweep.width,
        settings.output.fps,
        settings.sweep.backend
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(&cli.input)?;

    // 2. Producer side
    let mut analyzer = SpectrumAnalyzer::new();
    analyzer.init_with_window(settings.analysis.block_length, settings.analysis.window)?;

    // 3. Consumer side
    let composer: Box<dyn SweepComposer> = match settings.sweep.backend {
        Backend::Cpu => Box::new(CpuSweep),
        Backend::Gpu => {
            log::info!("Initializing GPU...");
            let gpu = GpuContext::new()?;
            log::info!("GPU adapter: {}", gpu.adapter_name);
            Box::new(GpuSweep::new(gpu))
        }
    };
    let mut compositor = SpectrogramCompositor::new(settings.compositor(), composer)?;

    // 4. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(
        &cli.output,
        &cli.input,
        settings.sweep.width,
        analyzer.bin_count(),
        &EncoderSettings {
            fps: settings.output.fps,
            codec: &settings.output.codec,
            pix_fmt: &settings.output.pix_fmt,
            crf: settings.output.crf,
        },
    )?;

    // 5. Render loop
    let total_frames = host::tick_count(&audio_data, settings.output.fps);
    log::info!(
        "Total frames: {}, Duration: {:.1}s",
        total_frames,
        audio_data.duration()
    );

    let pb = ProgressBar::new(total_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let write_frame = |image: &echolight::render::SpectrogramImage| -> Result<()> {
        encoder.write_image(image)?;
        pb.inc(1);
        Ok(())
    };

    let stats = if cli.offline {
        host::run_offline(
            &mut analyzer,
            &audio_data,
            settings.analysis.channel_index,
            &mut compositor,
            settings.output.fps,
            write_frame,
        )
    } else {
        host::run_live(
            &mut analyzer,
            &audio_data,
            settings.analysis.channel_index,
            &mut compositor,
            settings.output.fps,
            write_frame,
        )
    }
    .context("Rendering failed")?;

    pb.finish_with_message("Rendering complete");
    analyzer.dispose();
    log::info!(
        "Analyzed {} blocks into {} frames",
        stats.blocks,
        stats.ticks
    );

    // 6. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}
