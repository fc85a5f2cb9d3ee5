//! Environment-driven settings for the `catalogue` CLI, following the same
//! "read env vars with fallback defaults" pattern the teacher's
//! `*Config::default()` impls use for backend endpoints, generalized here
//! into a single `envy::prefixed("CATALOGUE_")`-bound struct so the binary
//! has one place to look for its own knobs (corpus root, worker pool sizes,
//! watch interval) rather than scattering `std::env::var` calls through
//! `main`.

use serde::Deserialize;

fn default_corpus_root() -> String {
    ".".to_string()
}

fn default_state_path() -> String {
    "catalogue_state.redb".to_string()
}

fn default_ocr_pool_size() -> usize {
    4
}

fn default_embed_pool_size() -> usize {
    2
}

fn default_rasterize_target_width() -> u32 {
    1600
}

fn default_scan_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_corpus_root")]
    pub corpus_root: String,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_ocr_pool_size")]
    pub ocr_pool_size: usize,
    #[serde(default = "default_embed_pool_size")]
    pub embed_pool_size: usize,
    #[serde(default = "default_rasterize_target_width")]
    pub rasterize_target_width: u32,
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            corpus_root: default_corpus_root(),
            state_path: default_state_path(),
            ocr_pool_size: default_ocr_pool_size(),
            embed_pool_size: default_embed_pool_size(),
            rasterize_target_width: default_rasterize_target_width(),
            scan_concurrency: default_scan_concurrency(),
        }
    }
}

impl Settings {
    /// Load from `CATALOGUE_*` environment variables, falling back to
    /// defaults for anything unset. Credentials and cluster endpoints are
    /// read separately by `catalogue_indexer::IndexerConfig` and
    /// `catalogue_embeddings::EmbeddingConfig`, which own those knobs.
    pub fn load() -> Result<Self, envy::Error> {
        envy::prefixed("CATALOGUE_").from_env::<Settings>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.corpus_root, ".");
        assert!(settings.ocr_pool_size > 0);
        assert!(settings.scan_concurrency > 0);
    }
}
