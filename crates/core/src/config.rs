use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub allow: AllowConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Drop directory watched for arrivals.
    pub source: String,
    /// Root of the mirrored destination tree.
    pub destination: String,
    /// Append-only JSONL rejection log.
    pub rejection_log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet window after the last arrival before a batch is triggered.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Stable-write poll interval; a file is only reported once its size and
    /// mtime stop changing across one interval.
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,
    /// Glob patterns never reported or ingested.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            quiet_ms: default_quiet_ms(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// None means unlimited.
    #[serde(default)]
    pub max_file_size_mb: Option<u64>,
    #[serde(default = "default_min_image_bytes")]
    pub min_image_bytes: u64,
    #[serde(default = "default_min_audio_duration_secs")]
    pub min_audio_duration_secs: f64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: None,
            min_image_bytes: default_min_image_bytes(),
            min_audio_duration_secs: default_min_audio_duration_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowConfig {
    /// Overall allow-list; anything else is rejected on arrival and swept
    /// from the source tree during cleanup.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_audio_extensions")]
    pub audio: Vec<String>,
    #[serde(default = "default_image_extensions")]
    pub image: Vec<String>,
}

impl Default for AllowConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            audio: default_audio_extensions(),
            image: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default)]
    pub verbose: bool,
    /// Strict mode deletes leftover disallowed files during cleanup;
    /// non-strict only logs them.
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            strict: default_strict(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    30_000
}

fn default_quiet_ms() -> u64 {
    2_000
}

fn default_min_image_bytes() -> u64 {
    1_024
}

fn default_min_audio_duration_secs() -> f64 {
    0.5
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_strict() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    [
        "mp3", "wav", "flac", "ogg", "m4a", "aac", "jpg", "jpeg", "png", "gif", "webp", "bmp",
        "tif", "tiff",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_audio_extensions() -> Vec<String> {
    ["mp3", "wav", "flac", "ogg", "m4a", "aac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
