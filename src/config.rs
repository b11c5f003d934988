use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dsp::WindowKind;
use crate::error::{Result, SweepError};
use crate::render::CompositorConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Frames per analysis block; must be a power of two.
    #[serde(default = "default_block_length")]
    pub block_length: usize,
    #[serde(default)]
    pub channel_index: usize,
    #[serde(default)]
    pub window: WindowKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_width")]
    pub width: usize,
    #[serde(default = "default_saturation")]
    pub saturation_amplitude: f32,
    #[serde(default)]
    pub backend: Backend,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            block_length: default_block_length(),
            channel_index: 0,
            window: WindowKind::default(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            width: default_sweep_width(),
            saturation_amplitude: default_saturation(),
            backend: Backend::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
        }
    }
}

pub fn default_block_length() -> usize { 1024 }
pub fn default_sweep_width() -> usize { 1024 }
pub fn default_saturation() -> f32 { 10.0 }
pub fn default_fps() -> u32 { 60 }
pub fn default_crf() -> u32 { 18 }
pub fn default_codec() -> String { "libx264".into() }
pub fn default_pix_fmt() -> String { "yuv420p".into() }

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SweepError::config(e.to_string()))
    }

    pub fn compositor(&self) -> CompositorConfig {
        CompositorConfig {
            sweep_width: self.sweep.width,
            saturation_amplitude: self.sweep.saturation_amplitude,
        }
    }

    /// Check everything that can be checked before any audio is seen.
    pub fn validate(&self) -> Result<()> {
        let n = self.analysis.block_length;
        if n < 2 || !n.is_power_of_two() {
            return Err(SweepError::config(format!(
                "analysis.block_length must be a power of two of at least 2, got {}",
                n
            )));
        }
        if self.output.fps == 0 {
            return Err(SweepError::config("output.fps must be at least 1"));
        }
        self.compositor().validate()
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match Config::parse(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("{}: {}", path.display(), err);
            None
        }
    }
}

/// `echolight.toml` in the working directory, then the per-user config locations.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("echolight.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("echolight").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("echolight").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.analysis.block_length, 1024);
        assert_eq!(config.analysis.window, WindowKind::BlackmanHarris);
        assert_eq!(config.sweep.width, 1024);
        assert_eq!(config.sweep.backend, Backend::Cpu);
        assert_eq!(config.output.fps, 60);
        config.validate().unwrap();
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [analysis]
            block_length = 2048
            channel_index = 1
            window = "rectangular"

            [sweep]
            width = 640
            saturation_amplitude = 4.5
            backend = "gpu"
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.block_length, 2048);
        assert_eq!(config.analysis.channel_index, 1);
        assert_eq!(config.analysis.window, WindowKind::Rectangular);
        assert_eq!(config.sweep.backend, Backend::Gpu);
        assert_eq!(
            config.compositor(),
            CompositorConfig {
                sweep_width: 640,
                saturation_amplitude: 4.5
            }
        );
        assert_eq!(config.output.codec, "libx264");
    }

    #[test]
    fn validate_catches_bad_values() {
        let mut config = Config::default();
        config.analysis.block_length = 1000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.saturation_amplitude = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        assert!(matches!(
            Config::parse("[sweep]\nwidth = \"wide\""),
            Err(SweepError::Configuration(_))
        ));
    }
}
