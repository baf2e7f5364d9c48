//! Prober abstractions for content inspection: audio stream probing and
//! magic-byte file type sniffing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ffprobe;
pub mod sniff;

pub use ffprobe::FfprobeProber;
pub use sniff::MagicSniffer;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("prober not available: {0}")]
    NotAvailable(String),
    #[error("probe failed: {0}")]
    ProbeFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream-level metadata reported by the audio prober.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub codec_type: String,
    pub codec_name: Option<String>,
}

/// Container-level metadata for a probed media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioProbe {
    pub streams: Vec<StreamInfo>,
    /// Duration in seconds; 0.0 when the container reports none.
    pub duration: f64,
    /// Bitrate in bits per second, when reported.
    pub bitrate: Option<u64>,
}

impl AudioProbe {
    /// First decodable audio stream, if any.
    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "audio")
    }
}

/// Detected file type from magic bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffedType {
    pub mime: String,
    pub ext: String,
}

#[async_trait::async_trait]
pub trait AudioProber: Send + Sync {
    /// Probe container/stream metadata for the file at `path`.
    async fn probe(&self, path: &Path) -> Result<AudioProbe, ProbeError>;
}

pub trait TypeSniffer: Send + Sync {
    /// Sniff the real content type from magic bytes. `Ok(None)` means the
    /// bytes matched no known signature; only I/O failures are errors.
    fn sniff(&self, path: &Path) -> Result<Option<SniffedType>, ProbeError>;
}
