//! Content validation: category-agnostic preconditions, then per-category
//! checks against the external probers. Invalid content is a normal
//! `valid:false` result, never an error.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use providers::{AudioProber, TypeSniffer};
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;

use crate::classify::Allowlist;
use crate::config::AppConfig;
use crate::models::{Category, ValidationResult};

/// Raster formats accepted regardless of what the extension claims.
const IMAGE_MIME_WHITELIST: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// Per-file verdict; `Skipped` covers files that vanished between detection
/// and validation, which is not a rejection.
#[derive(Debug)]
pub enum Verdict {
    Skipped,
    Checked(ValidationResult),
}

pub struct Validator {
    prober: Arc<dyn AudioProber>,
    sniffer: Arc<dyn TypeSniffer>,
    allowlist: Allowlist,
    max_file_size_mb: Option<u64>,
    min_image_bytes: u64,
    min_audio_duration_secs: f64,
    probe_timeout: Duration,
}

impl Validator {
    pub fn new(cfg: &AppConfig, prober: Arc<dyn AudioProber>, sniffer: Arc<dyn TypeSniffer>) -> Self {
        Self {
            prober,
            sniffer,
            allowlist: Allowlist::from_config(&cfg.allow),
            max_file_size_mb: cfg.limits.max_file_size_mb,
            min_image_bytes: cfg.limits.min_image_bytes,
            min_audio_duration_secs: cfg.limits.min_audio_duration_secs,
            probe_timeout: Duration::from_secs(cfg.limits.probe_timeout_secs.max(1)),
        }
    }

    pub async fn validate(&self, path: &Path) -> Verdict {
        let category = self.allowlist.categorize(path);

        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "vanished before validation");
                return Verdict::Skipped;
            }
            Err(e) => {
                return Verdict::Checked(ValidationResult::rejected(
                    category,
                    0,
                    format!("cannot access file: {e}"),
                ));
            }
        };
        let size = meta.len();

        if !self.allowlist.is_allowed(path) {
            return Verdict::Checked(ValidationResult::rejected(
                category,
                size,
                "extension not allowed",
            ));
        }
        if size == 0 {
            return Verdict::Checked(ValidationResult::rejected(category, size, "file is empty"));
        }
        if let Some(max_mb) = self.max_file_size_mb {
            if size > max_mb * 1024 * 1024 {
                return Verdict::Checked(ValidationResult::rejected(
                    category,
                    size,
                    format!("file exceeds maximum size of {max_mb} MB"),
                ));
            }
        }

        let result = match category {
            Category::Audio => self.validate_audio(path, size).await,
            Category::Image => self.validate_image(path, size),
            Category::Other => {
                ValidationResult::rejected(category, size, "not an audio or image file")
            }
        };
        Verdict::Checked(result)
    }

    async fn validate_audio(&self, path: &Path, size: u64) -> ValidationResult {
        let probe = match timeout(self.probe_timeout, self.prober.probe(path)).await {
            Err(_) => {
                return ValidationResult::rejected(
                    Category::Audio,
                    size,
                    format!("audio probe timed out after {}s", self.probe_timeout.as_secs()),
                );
            }
            Ok(Err(e)) => {
                return ValidationResult::rejected(
                    Category::Audio,
                    size,
                    format!("audio probe failed: {e}"),
                );
            }
            Ok(Ok(probe)) => probe,
        };

        let stream = match probe.audio_stream() {
            Some(s) => s,
            None => {
                return ValidationResult::rejected(
                    Category::Audio,
                    size,
                    "no decodable audio stream",
                );
            }
        };
        if probe.duration <= 0.0 {
            return ValidationResult::rejected(Category::Audio, size, "audio has no duration");
        }
        if probe.duration < self.min_audio_duration_secs {
            return ValidationResult::rejected(
                Category::Audio,
                size,
                format!(
                    "audio duration {:.2}s below minimum {:.2}s",
                    probe.duration, self.min_audio_duration_secs
                ),
            );
        }

        ValidationResult::accepted(
            Category::Audio,
            size,
            json!({
                "duration_secs": probe.duration,
                "bitrate": probe.bitrate,
                "codec": stream.codec_name,
                "streams": probe.streams.len(),
            }),
        )
    }

    fn validate_image(&self, path: &Path, size: u64) -> ValidationResult {
        let sniffed = match self.sniffer.sniff(path) {
            Ok(Some(s)) => s,
            Ok(None) => {
                return ValidationResult::rejected(
                    Category::Image,
                    size,
                    "unrecognized file content",
                );
            }
            Err(e) => {
                return ValidationResult::rejected(
                    Category::Image,
                    size,
                    format!("content sniff failed: {e}"),
                );
            }
        };

        if !IMAGE_MIME_WHITELIST.contains(&sniffed.mime.as_str()) {
            return ValidationResult::rejected(
                Category::Image,
                size,
                format!("content type {} is not an allowed image format", sniffed.mime),
            );
        }
        if size < self.min_image_bytes {
            return ValidationResult::rejected(
                Category::Image,
                size,
                format!("image smaller than minimum {} bytes", self.min_image_bytes),
            );
        }

        ValidationResult::accepted(
            Category::Image,
            size,
            json!({
                "mime": sniffed.mime,
                "sniffed_ext": sniffed.ext,
                "size": size,
            }),
        )
    }
}
