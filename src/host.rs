//! Drives an analyzer and a compositor over a decoded stream.
//!
//! [`run_live`] is the real-time arrangement: a producer thread feeds blocks at the pace the
//! audio would arrive while the calling thread ticks the compositor at the frame rate. The
//! two only meet in the snapshot buffer. [`run_offline`] interleaves the same work on one
//! thread so a render is reproducible.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::decode::AudioData;
use crate::audio::SpectrumAnalyzer;
use crate::render::{SpectrogramCompositor, SpectrogramImage};

/// Fixed-period deadline keeper.
pub struct Pacer {
    period: Duration,
    next: Instant,
}

impl Pacer {
    /// The first [`wait`](Self::wait) returns immediately.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next deadline. A caller that fell behind resumes from now instead of
    /// bursting through the missed deadlines.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.next = now + self.period;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Blocks handed to the analyzer.
    pub blocks: usize,
    /// Compositor ticks, one per emitted frame.
    pub ticks: u64,
}

/// Frames a render of `audio` at `fps` will emit.
pub fn tick_count(audio: &AudioData, fps: u32) -> u64 {
    if audio.sample_rate == 0 {
        return 0;
    }
    (audio.frames() as f64 * fps as f64 / audio.sample_rate as f64).ceil() as u64
}

fn check_stream(audio: &AudioData, channel_index: usize, fps: u32) -> Result<()> {
    if audio.sample_rate == 0 || audio.channels == 0 {
        anyhow::bail!("audio stream has no sample rate or no channels");
    }
    if channel_index >= audio.channels {
        anyhow::bail!(
            "channel {} requested but the stream has {} channel(s)",
            channel_index,
            audio.channels
        );
    }
    if fps == 0 {
        anyhow::bail!("frame rate must be at least 1");
    }
    Ok(())
}

/// Real-time session: the producer runs on its own thread, paced to the audio clock, and the
/// compositor ticks here every `1 / fps` seconds until the producer runs out of blocks.
pub fn run_live<F>(
    analyzer: &mut SpectrumAnalyzer,
    audio: &AudioData,
    channel_index: usize,
    compositor: &mut SpectrogramCompositor,
    fps: u32,
    mut on_frame: F,
) -> Result<SessionStats>
where
    F: FnMut(&SpectrogramImage) -> Result<()>,
{
    check_stream(audio, channel_index, fps)?;
    let snapshot = analyzer.snapshot_buffer()?;
    let block_length = analyzer.block_length();
    let block_period = Duration::from_secs_f64(block_length as f64 / audio.sample_rate as f64);
    let frame_period = Duration::from_secs_f64(1.0 / fps as f64);

    log::debug!(
        "Live session: block every {:?}, frame every {:?}",
        block_period,
        frame_period
    );

    let stop = AtomicBool::new(false);
    let stop = &stop;

    thread::scope(|scope| -> Result<SessionStats> {
        let producer = thread::Builder::new()
            .name("echolight-producer".into())
            .spawn_scoped(scope, move || -> crate::Result<usize> {
                let mut pacer = Pacer::new(block_period);
                let mut blocks = 0;
                for block in audio.blocks(block_length) {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    pacer.wait();
                    analyzer.analyze(block, channel_index, audio.channels)?;
                    blocks += 1;
                }
                Ok(blocks)
            })
            .context("Failed to spawn producer thread")?;

        let mut ticks = 0u64;
        let mut consume = || -> Result<()> {
            let mut pacer = Pacer::new(frame_period);
            while !producer.is_finished() {
                pacer.wait();
                compositor.tick(&snapshot)?;
                on_frame(compositor.output())?;
                ticks += 1;
            }
            Ok(())
        };
        let consumed = consume();
        stop.store(true, Ordering::Relaxed);

        let produced = producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))?;
        consumed?;
        let blocks = produced?;

        Ok(SessionStats { blocks, ticks })
    })
}

/// Deterministic session: before each tick, every block that ends by the close of that
/// frame's period is analyzed. Emits [`tick_count`] frames.
pub fn run_offline<F>(
    analyzer: &mut SpectrumAnalyzer,
    audio: &AudioData,
    channel_index: usize,
    compositor: &mut SpectrogramCompositor,
    fps: u32,
    mut on_frame: F,
) -> Result<SessionStats>
where
    F: FnMut(&SpectrogramImage) -> Result<()>,
{
    check_stream(audio, channel_index, fps)?;
    let snapshot = analyzer.snapshot_buffer()?;
    let block_length = analyzer.block_length();
    let frames_per_tick = audio.sample_rate as f64 / fps as f64;

    let mut blocks = audio.blocks(block_length);
    let mut stats = SessionStats::default();
    let mut analyzed_frames = 0usize;

    for tick in 0..tick_count(audio, fps) {
        let deadline = ((tick + 1) as f64 * frames_per_tick) as usize;
        while analyzed_frames + block_length <= deadline {
            let Some(block) = blocks.next() else { break };
            analyzer.analyze(block, channel_index, audio.channels)?;
            analyzed_frames += block_length;
            stats.blocks += 1;
        }

        compositor.tick(&snapshot)?;
        on_frame(compositor.output())?;
        stats.ticks += 1;
    }

    Ok(stats)
}
