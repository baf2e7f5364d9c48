//! Extension-based category classification against the configured allow-list.

use std::collections::HashSet;
use std::path::Path;

use crate::config::AllowConfig;
use crate::models::Category;

#[derive(Debug, Clone)]
pub struct Allowlist {
    allowed: HashSet<String>,
    audio: HashSet<String>,
    image: HashSet<String>,
}

impl Allowlist {
    pub fn from_config(allow: &AllowConfig) -> Self {
        Self {
            allowed: lower_set(&allow.extensions),
            audio: lower_set(&allow.audio),
            image: lower_set(&allow.image),
        }
    }

    pub fn is_allowed(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self.allowed.contains(&ext),
            None => false,
        }
    }

    /// "Other" is not a passthrough: files in the allow-list but in neither
    /// subset still resolve to it and are rejected downstream.
    pub fn categorize(&self, path: &Path) -> Category {
        match extension_of(path) {
            Some(ext) if self.audio.contains(&ext) => Category::Audio,
            Some(ext) if self.image.contains(&ext) => Category::Image,
            _ => Category::Other,
        }
    }
}

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn lower_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .collect()
}
