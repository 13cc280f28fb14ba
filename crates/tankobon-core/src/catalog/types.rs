//! Source-agnostic series record produced by every catalog client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a catalog backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogId {
    AniList,
    MangaDex,
}

impl CatalogId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogId::AniList => "anilist",
            CatalogId::MangaDex => "mangadex",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "anilist" => Some(CatalogId::AniList),
            "mangadex" => Some(CatalogId::MangaDex),
            _ => None,
        }
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog-scoped identifier of a canonical record.
///
/// Identifiers from different catalogs are never compared; the rendered form
/// (`anilist:30013`) keeps them apart in shared caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub catalog: CatalogId,
    pub value: String,
}

impl RecordId {
    pub fn new(catalog: CatalogId, value: impl Into<String>) -> Self {
        Self {
            catalog,
            value: value.into(),
        }
    }

    /// Parse the `catalog:value` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (catalog, value) = s.split_once(':')?;
        if value.is_empty() {
            return None;
        }
        Some(Self::new(CatalogId::from_str(catalog)?, value))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.catalog, self.value)
    }
}

/// Title variants of a series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub romaji: String,
    pub english: String,
    pub native: String,
}

impl Title {
    /// Display name: English, then romaji, then native.
    pub fn display(&self) -> &str {
        [&self.english, &self.romaji, &self.native]
            .into_iter()
            .find(|t| !t.is_empty())
            .map(|t| t.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.romaji.is_empty() && self.english.is_empty() && self.native.is_empty()
    }
}

/// A descriptive tag with its relevance rank (0-100).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub description: String,
    pub rank: u32,
}

/// One staff credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffCredit {
    pub role: String,
    pub name: String,
}

/// Cover image URLs, largest first, plus the accent color.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub extra_large: String,
    pub large: String,
    pub medium: String,
    pub color: String,
}

impl CoverImage {
    /// The largest available cover URL.
    pub fn best_url(&self) -> Option<&str> {
        [&self.extra_large, &self.large, &self.medium]
            .into_iter()
            .find(|u| !u.is_empty())
            .map(|u| u.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.extra_large.is_empty()
            && self.large.is_empty()
            && self.medium.is_empty()
            && self.color.is_empty()
    }
}

/// A partial date; zero means unknown for any component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl FuzzyDate {
    pub fn is_empty(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }
}

/// Publication lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesStatus {
    #[default]
    Unknown,
    Ongoing,
    Completed,
    Cancelled,
    Hiatus,
    NotYetReleased,
}

impl SeriesStatus {
    /// Map an AniList `MediaStatus` value.
    pub fn from_anilist(status: &str) -> Self {
        match status {
            "RELEASING" => SeriesStatus::Ongoing,
            "FINISHED" => SeriesStatus::Completed,
            "CANCELLED" => SeriesStatus::Cancelled,
            "HIATUS" => SeriesStatus::Hiatus,
            "NOT_YET_RELEASED" => SeriesStatus::NotYetReleased,
            _ => SeriesStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesStatus::Unknown => "UNKNOWN",
            SeriesStatus::Ongoing => "ONGOING",
            SeriesStatus::Completed => "COMPLETED",
            SeriesStatus::Cancelled => "CANCELLED",
            SeriesStatus::Hiatus => "HIATUS",
            SeriesStatus::NotYetReleased => "NOT_YET_RELEASED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ONGOING" => SeriesStatus::Ongoing,
            "COMPLETED" => SeriesStatus::Completed,
            "CANCELLED" => SeriesStatus::Cancelled,
            "HIATUS" => SeriesStatus::Hiatus,
            "NOT_YET_RELEASED" => SeriesStatus::NotYetReleased,
            _ => SeriesStatus::Unknown,
        }
    }
}

/// Publication format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationFormat {
    #[default]
    Unknown,
    Manga,
    Novel,
    OneShot,
}

impl PublicationFormat {
    pub fn from_anilist(format: &str) -> Self {
        match format {
            "MANGA" => PublicationFormat::Manga,
            "NOVEL" => PublicationFormat::Novel,
            "ONE_SHOT" => PublicationFormat::OneShot,
            _ => PublicationFormat::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationFormat::Unknown => "UNKNOWN",
            PublicationFormat::Manga => "MANGA",
            PublicationFormat::Novel => "NOVEL",
            PublicationFormat::OneShot => "ONE_SHOT",
        }
    }

    pub fn from_str(s: &str) -> Self {
        Self::from_anilist(s)
    }
}

/// The resolved, source-agnostic record of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: RecordId,
    pub title: Title,
    pub description: String,
    pub genres: Vec<String>,
    pub tags: Vec<Tag>,
    pub staff: Vec<StaffCredit>,
    pub characters: Vec<String>,
    pub cover: CoverImage,
    pub banner_image: String,
    pub status: SeriesStatus,
    pub start_date: FuzzyDate,
    pub end_date: FuzzyDate,
    pub chapters: u32,
    pub volumes: u32,
    pub popularity: u32,
    pub average_score: u32,
    pub mean_score: u32,
    pub is_licensed: bool,
    /// Unix timestamp of the last upstream update, 0 when unknown.
    pub updated_at: i64,
    pub synonyms: Vec<String>,
    pub urls: Vec<String>,
    pub format: PublicationFormat,
    pub country: String,
    pub site_url: String,
}

impl CanonicalRecord {
    /// An empty record carrying only an identifier and a title.
    pub fn new(id: RecordId, title: Title) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            genres: Vec::new(),
            tags: Vec::new(),
            staff: Vec::new(),
            characters: Vec::new(),
            cover: CoverImage::default(),
            banner_image: String::new(),
            status: SeriesStatus::Unknown,
            start_date: FuzzyDate::default(),
            end_date: FuzzyDate::default(),
            chapters: 0,
            volumes: 0,
            popularity: 0,
            average_score: 0,
            mean_score: 0,
            is_licensed: false,
            updated_at: 0,
            synonyms: Vec::new(),
            urls: Vec::new(),
            format: PublicationFormat::Unknown,
            country: String::new(),
            site_url: String::new(),
        }
    }

    /// Name used for matching and display.
    pub fn display_name(&self) -> &str {
        self.title.display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_round_trip() {
        let id = RecordId::new(CatalogId::AniList, "30013");
        assert_eq!(id.to_string(), "anilist:30013");
        assert_eq!(RecordId::parse("anilist:30013"), Some(id));
        assert_eq!(RecordId::parse("unknown:1"), None);
        assert_eq!(RecordId::parse("anilist:"), None);
    }

    #[test]
    fn test_display_name_preference() {
        let mut title = Title {
            romaji: "Shingeki no Kyojin".to_string(),
            english: "Attack on Titan".to_string(),
            native: "進撃の巨人".to_string(),
        };
        assert_eq!(title.display(), "Attack on Titan");
        title.english.clear();
        assert_eq!(title.display(), "Shingeki no Kyojin");
        title.romaji.clear();
        assert_eq!(title.display(), "進撃の巨人");
    }

    #[test]
    fn test_cover_best_url() {
        let cover = CoverImage {
            extra_large: String::new(),
            large: "https://img/large.png".to_string(),
            medium: "https://img/medium.png".to_string(),
            color: "#fff".to_string(),
        };
        assert_eq!(cover.best_url(), Some("https://img/large.png"));
        assert_eq!(CoverImage::default().best_url(), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SeriesStatus::from_anilist("RELEASING"), SeriesStatus::Ongoing);
        assert_eq!(SeriesStatus::from_anilist("FINISHED"), SeriesStatus::Completed);
        assert_eq!(SeriesStatus::from_anilist("???"), SeriesStatus::Unknown);
        assert_eq!(
            SeriesStatus::from_str(SeriesStatus::Hiatus.as_str()),
            SeriesStatus::Hiatus
        );
    }
}
