//! Audio probing via the `ffprobe` binary with JSON output.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{AudioProbe, AudioProber, ProbeError, StreamInfo};

#[derive(Debug, Clone)]
pub struct FfprobeConfig {
    /// Binary name or absolute path; `ffprobe` by default.
    pub binary: String,
}

impl Default for FfprobeConfig {
    fn default() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FfprobeProber {
    cfg: FfprobeConfig,
}

impl FfprobeProber {
    pub fn new(cfg: FfprobeConfig) -> Self {
        Self { cfg }
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

fn parse_output(json: &str) -> Result<AudioProbe, ProbeError> {
    let parsed: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProbeError::ProbeFailed(format!("unparseable ffprobe output: {e}")))?;

    let streams = parsed
        .streams
        .into_iter()
        .map(|s| StreamInfo {
            codec_type: s.codec_type.unwrap_or_default(),
            codec_name: s.codec_name,
        })
        .collect();

    // ffprobe reports duration and bit_rate as strings in format JSON.
    let (duration, bitrate) = match parsed.format {
        Some(f) => (
            f.duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0),
            f.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok()),
        ),
        None => (0.0, None),
    };

    Ok(AudioProbe {
        streams,
        duration,
        bitrate,
    })
}

#[async_trait::async_trait]
impl AudioProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<AudioProbe, ProbeError> {
        let output = Command::new(&self.cfg.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|e| ProbeError::NotAvailable(format!("{}: {e}", self.cfg.binary)))?;

        if !output.status.success() {
            return Err(ProbeError::ProbeFailed(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }

        let json = std::str::from_utf8(&output.stdout)
            .map_err(|_| ProbeError::ProbeFailed("non-utf8 ffprobe output".to_string()))?;
        debug!(path = %path.display(), "ffprobe ok");
        parse_output(json)
    }
}
