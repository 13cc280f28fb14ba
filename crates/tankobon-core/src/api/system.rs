//! Settings and cache maintenance methods on TankobonApi.

use crate::cache::{CacheBackend, CacheStats};
use crate::config::{PathsConfig, Settings};
use crate::error::Result;
use crate::TankobonApi;
use std::path::PathBuf;

impl TankobonApi {
    /// The settings this instance was built with.
    pub fn get_settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::DOWNLOADS_DIR_NAME)
    }

    /// Entry counts and sizes of the resolution cache.
    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.state.cache_backend.get_stats()
    }

    /// Remove expired resolution cache entries.
    pub fn cleanup_cache(&self) -> Result<usize> {
        self.state.cache_backend.cleanup_expired()
    }

    /// Drop every cached binding, record and failure.
    pub fn clear_resolution_cache(&self) -> Result<usize> {
        self.state.resolver.cache().clear()
    }
}
