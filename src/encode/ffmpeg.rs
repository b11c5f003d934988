use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::render::SpectrogramImage;

/// Output settings for the video pipe.
pub struct EncoderSettings<'a> {
    pub fps: u32,
    pub codec: &'a str,
    pub pix_fmt: &'a str,
    pub crf: u32,
}

/// Streams sweep images into an `ffmpeg` child as raw RGBA frames, muxed with the source audio.
///
/// Bin 0 is row 0 of a sweep image, so rows are written bottom-up to put low frequencies at
/// the bottom of the video.
pub struct FfmpegEncoder {
    child: Child,
    width: usize,
    height: usize,
    frame: Vec<u8>,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn new(
        output_path: &Path,
        input_audio: &Path,
        width: usize,
        height: usize,
        settings: &EncoderSettings<'_>,
    ) -> Result<Self> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .args(["-f", "rawvideo", "-pixel_format", "rgba"])
            .arg("-video_size")
            .arg(format!("{}x{}", width, height))
            .arg("-framerate")
            .arg(settings.fps.to_string())
            .args(["-i", "pipe:0", "-i"])
            .arg(input_audio)
            .args(["-c:v", settings.codec, "-pix_fmt", settings.pix_fmt])
            .arg("-crf")
            .arg(settings.crf.to_string())
            .args(["-preset", "medium", "-c:a", "aac", "-b:a", "192k", "-shortest"])
            .arg(output_path);

        let child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            width,
            height,
            settings.fps,
            settings.codec
        );

        Ok(Self {
            child,
            width,
            height,
            frame: vec![0; width * height * 4],
            frames_written: 0,
        })
    }

    /// Write one sweep image as a video frame, flipped so bin 0 lands on the bottom row.
    pub fn write_image(&mut self, image: &SpectrogramImage) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            anyhow::bail!(
                "sweep image is {:?}, encoder expects {}x{}",
                image.dimensions(),
                self.width,
                self.height
            );
        }

        flip_rows_into(image, &mut self.frame);

        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin
            .write_all(&self.frame)
            .context("Failed to write frame to ffmpeg")?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete ({} frames)", self.frames_written);
        Ok(())
    }
}

fn flip_rows_into(image: &SpectrogramImage, frame: &mut [u8]) {
    let row_bytes = image.width() * 4;
    for (dst, row) in frame.chunks_exact_mut(row_bytes).zip(image.rows().rev()) {
        dst.copy_from_slice(bytemuck::cast_slice(row));
    }
}
