//! TOML configuration: directory layout, external tool commands, and
//! stability tuning, with defaults that match a stock installation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SubflowError};

fn default_translated_suffix() -> String {
    "zh-tw".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub stability: StabilityConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory watched for freshly recorded audio files
    pub watch_dir: PathBuf,
    /// Directory where the external tools read and write their files
    pub work_dir: PathBuf,
    /// Directory holding the subtitle file (and its pristine copy) between
    /// transcription and final delivery; watched for manual edits
    pub review_dir: PathBuf,
    /// Directory receiving all finished files
    pub output_dir: PathBuf,
    /// Directory for per-job state records and logs
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Command producing `{base}.ass` from `{base}.wav` (batch script or binary)
    pub process_audio_command: PathBuf,
    /// Path to ffmpeg binary used for the ass-to-srt conversion
    pub converter_path: PathBuf,
    /// Command producing the translated subtitle from `{base}.srt`
    pub translate_command: PathBuf,
    /// Open intermediate and final subtitle files in the default editor
    pub open_in_editor: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Give up waiting for a file to settle after this many seconds
    pub timeout_secs: u64,
    /// A file counts as settled once its size is unchanged for this long
    pub stable_secs: u64,
    /// Size sampling interval in milliseconds
    pub poll_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Extension of incoming audio files (without dot)
    pub audio_extension: String,
    /// Extension of the subtitle files the transcriber produces (without dot)
    pub subtitle_extension: String,
    /// Suffix the translation tool appends to its output, e.g. `{base}_zh-tw.srt`
    #[serde(default = "default_translated_suffix")]
    pub translated_suffix: String,
}

impl StabilityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stable_time(&self) -> Duration {
        Duration::from_secs(self.stable_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                watch_dir: PathBuf::from("Work_room"),
                work_dir: PathBuf::from("."),
                review_dir: PathBuf::from("review"),
                output_dir: PathBuf::from("Work_room"),
                state_dir: PathBuf::from(".subflow"),
            },
            tools: ToolsConfig {
                process_audio_command: PathBuf::from("process_audio.bat"),
                converter_path: PathBuf::from("ffmpeg"),
                translate_command: PathBuf::from("translate_srt_to_chinese.bat"),
                open_in_editor: true,
            },
            stability: StabilityConfig {
                timeout_secs: 60,
                stable_secs: 2,
                poll_millis: 500,
            },
            pipeline: PipelineConfig {
                audio_extension: "wav".to_string(),
                subtitle_extension: "ass".to_string(),
                translated_suffix: default_translated_suffix(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubflowError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubflowError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubflowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Path of the audio file a job starts from.
    pub fn audio_path(&self, base: &str) -> PathBuf {
        self.paths
            .watch_dir
            .join(format!("{}.{}", base, self.pipeline.audio_extension))
    }

    /// Subtitle file as written by the transcription tool, before review.
    pub fn work_subtitle_path(&self, base: &str) -> PathBuf {
        self.paths
            .work_dir
            .join(format!("{}.{}", base, self.pipeline.subtitle_extension))
    }

    /// Subtitle file while it sits in the review directory.
    pub fn review_subtitle_path(&self, base: &str) -> PathBuf {
        self.paths
            .review_dir
            .join(format!("{}.{}", base, self.pipeline.subtitle_extension))
    }

    /// Pristine copy kept next to the reviewed subtitle for later diffing.
    pub fn pristine_subtitle_path(&self, base: &str) -> PathBuf {
        self.paths
            .review_dir
            .join(format!("{}.orig.{}", base, self.pipeline.subtitle_extension))
    }

    pub fn srt_path(&self, base: &str) -> PathBuf {
        self.paths.work_dir.join(format!("{}.srt", base))
    }

    pub fn translated_srt_path(&self, base: &str) -> PathBuf {
        self.paths
            .work_dir
            .join(format!("{}_{}.srt", base, self.pipeline.translated_suffix))
    }
}
