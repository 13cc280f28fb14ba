//! Centralized configuration for tankobon.
//!
//! Compile-time constants live in the holder structs below. User-tunable
//! behaviour lives in [`Settings`], which is persisted as `settings.json` under
//! the library root.

use crate::error::{Result, TankobonError};
use crate::metadata::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "tankobon";
    pub const USER_AGENT: &'static str = "tankobon/0.3";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DOWNLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const ANILIST_API_URL: &'static str = "https://graphql.anilist.co";
    pub const ANILIST_PAGE_SIZE: u32 = 30;
    pub const MANGADEX_API_BASE: &'static str = "https://api.mangadex.org";
    pub const MANGADEX_UPLOADS_BASE: &'static str = "https://uploads.mangadex.org";
    pub const MANGADEX_SITE_BASE: &'static str = "https://mangadex.org";
    pub const MANGADEX_CATALOG_LIMIT: u32 = 5;
    pub const MANGADEX_SEARCH_LIMIT: u32 = 50;
    pub const MANGADEX_FEED_PAGE_SIZE: u32 = 500;
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const METADATA_DIR_NAME: &'static str = "metadata";
    pub const DOWNLOADS_DIR_NAME: &'static str = "downloads";
    pub const DATABASE_FILENAME: &'static str = "tankobon.sqlite";
    pub const CACHE_DB_FILENAME: &'static str = "resolution-cache.sqlite";
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
    pub const HISTORY_FILENAME: &'static str = "history.json";
    pub const SERIES_JSON_FILENAME: &'static str = "series.json";
    pub const COVER_BASENAME: &'static str = "cover";
    pub const COMIC_INFO_FILENAME: &'static str = "ComicInfo.xml";
}

/// Metadata resolution tuning.
pub struct ResolverConfig;

impl ResolverConfig {
    pub const DEFAULT_RELAXATION_LIMIT: u32 = 3;
    pub const BINDING_TTL: Duration = Duration::from_secs(30 * 86_400);
    pub const NO_MATCH_TTL: Duration = Duration::from_secs(86_400);
    pub const RECORD_TTL: Duration = Duration::from_secs(90 * 86_400);
    pub const FAILURE_TTL: Duration = Duration::from_secs(86_400);
    pub const MEMORY_CACHE_CAPACITY: u64 = 2_048;
    /// Every search result lands in the record namespace, so it needs far
    /// more room than the name bindings that point into it.
    pub const MEMORY_RECORD_CAPACITY: u64 = 65_536;
}

/// Chapter download defaults.
pub struct DownloadConfig;

impl DownloadConfig {
    pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;
    pub const DEFAULT_CHAPTER_TEMPLATE: &'static str = "[{padded-index}] {chapter}";
    pub const STAGING_PREFIX: &'static str = "tankobon-staging";
    pub const DEFAULT_LANGUAGE: &'static str = "en";
}

/// Output format of a downloaded chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A zip archive of the pages.
    #[default]
    Cbz,
    /// A directory of page images.
    Plain,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Cbz => "cbz",
            OutputFormat::Plain => "plain",
        }
    }

    /// File extension appended to chapter names, if any.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Cbz => Some("cbz"),
            OutputFormat::Plain => None,
        }
    }

    /// Whether pages are staged outside the final location before assembly.
    pub fn stages_in_temp(&self) -> bool {
        !matches!(self, OutputFormat::Plain)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cbz" => Some(OutputFormat::Cbz),
            "plain" => Some(OutputFormat::Plain),
            _ => None,
        }
    }
}

/// User-tunable settings, persisted as `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub format: OutputFormat,
    pub parallel_downloads: usize,
    pub redownload_existing: bool,
    pub create_series_dir: bool,
    pub create_volume_dir: bool,
    pub chapter_name_template: String,
    pub fetch_metadata: bool,
    pub write_series_json: bool,
    pub download_cover: bool,
    pub save_history: bool,
    pub comic_info_xml: bool,
    pub relaxation_limit: u32,
    pub use_secondary_catalog: bool,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Cbz,
            parallel_downloads: DownloadConfig::DEFAULT_PARALLEL_DOWNLOADS,
            redownload_existing: false,
            create_series_dir: true,
            create_volume_dir: false,
            chapter_name_template: DownloadConfig::DEFAULT_CHAPTER_TEMPLATE.to_string(),
            fetch_metadata: true,
            write_series_json: true,
            download_cover: true,
            save_history: true,
            comic_info_xml: true,
            relaxation_limit: ResolverConfig::DEFAULT_RELAXATION_LIMIT,
            use_secondary_catalog: true,
            language: DownloadConfig::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = atomic_read_json::<Settings>(path)?.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the download pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.parallel_downloads == 0 {
            return Err(TankobonError::Validation {
                field: "parallel_downloads".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.chapter_name_template.trim().is_empty() {
            return Err(TankobonError::Validation {
                field: "chapter_name_template".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.relaxation_limit == 0 {
            return Err(TankobonError::Validation {
                field: "relaxation_limit".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
