//! Local series metadata and its persisted forms.

use crate::catalog::{CoverImage, FuzzyDate, PublicationFormat, SeriesStatus};
use serde::{Deserialize, Serialize};

/// Staff names split by the four roles comic readers understand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffBuckets {
    pub story: Vec<String>,
    pub art: Vec<String>,
    pub translation: Vec<String>,
    pub lettering: Vec<String>,
}

impl StaffBuckets {
    pub fn is_empty(&self) -> bool {
        self.story.is_empty()
            && self.art.is_empty()
            && self.translation.is_empty()
            && self.lettering.is_empty()
    }
}

/// Mutable metadata of a local series.
///
/// Same shape as a canonical record minus the identifier. Empty strings,
/// empty lists and zeros mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesMetadata {
    pub summary: String,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub characters: Vec<String>,
    pub staff: StaffBuckets,
    pub cover: CoverImage,
    pub banner_image: String,
    pub status: SeriesStatus,
    pub start_date: FuzzyDate,
    pub end_date: FuzzyDate,
    pub chapters: u32,
    pub volumes: u32,
    pub synonyms: Vec<String>,
    pub urls: Vec<String>,
    pub publisher: String,
    pub format: PublicationFormat,
    pub average_score: u32,
    pub mean_score: u32,
    pub popularity: u32,
    pub is_licensed: bool,
    pub updated_at: i64,
    pub country: String,
}

/// The persisted unit of the metadata stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Identifier of the series within its source.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub metadata: SeriesMetadata,
}

impl SeriesRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: String::new(),
            source_id: String::new(),
            source_name: String::new(),
            metadata: SeriesMetadata::default(),
        }
    }
}

/// `series.json` sidecar read by comic servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesJson {
    pub metadata: SeriesJsonMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesJsonMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description_formatted: String,
    pub description_text: String,
    pub publisher: String,
    pub status: String,
    pub year: u32,
    pub total_chapters: usize,
    pub total_issues: usize,
    pub booktype: String,
    #[serde(rename = "ComicImage")]
    pub comic_image: String,
    #[serde(rename = "comicId")]
    pub comic_id: u32,
    pub publication_run: String,
}

impl SeriesJson {
    /// Build the sidecar for a series with `chapter_count` known chapters.
    pub fn from_series(name: &str, metadata: &SeriesMetadata, chapter_count: usize) -> Self {
        let status = match metadata.status {
            SeriesStatus::Completed => "Completed",
            SeriesStatus::Ongoing => "Continuing",
            _ => "Unknown",
        };

        let start = format!("{} {}", metadata.start_date.month, metadata.start_date.year);
        let end = if metadata.end_date.year > 0 {
            format!("{} {}", metadata.end_date.month, metadata.end_date.year)
        } else {
            "0 0".to_string()
        };

        Self {
            metadata: SeriesJsonMetadata {
                kind: "comicSeries".to_string(),
                name: name.to_string(),
                description_formatted: metadata.summary.clone(),
                description_text: metadata.summary.clone(),
                publisher: metadata.staff.story.first().cloned().unwrap_or_default(),
                status: status.to_string(),
                year: metadata.start_date.year,
                total_chapters: chapter_count,
                total_issues: chapter_count,
                booktype: "manga".to_string(),
                comic_image: metadata.cover.best_url().unwrap_or_default().to_string(),
                comic_id: 0,
                publication_run: format!("{} - {}", start, end),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_series() -> SeriesMetadata {
        SeriesMetadata {
            summary: "A swordsman's story.".to_string(),
            status: SeriesStatus::Completed,
            start_date: FuzzyDate {
                year: 1998,
                month: 3,
                day: 0,
            },
            end_date: FuzzyDate {
                year: 2015,
                month: 9,
                day: 1,
            },
            staff: StaffBuckets {
                story: vec!["Takehiko Inoue".to_string()],
                ..Default::default()
            },
            cover: CoverImage {
                large: "https://img/vagabond.jpg".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_series_json_fields() {
        let json = SeriesJson::from_series("Vagabond", &finished_series(), 327);
        let m = &json.metadata;
        assert_eq!(m.kind, "comicSeries");
        assert_eq!(m.status, "Completed");
        assert_eq!(m.publisher, "Takehiko Inoue");
        assert_eq!(m.year, 1998);
        assert_eq!(m.total_issues, 327);
        assert_eq!(m.comic_image, "https://img/vagabond.jpg");
        assert_eq!(m.publication_run, "3 1998 - 9 2015");
    }

    #[test]
    fn test_series_json_open_run() {
        let mut metadata = finished_series();
        metadata.status = SeriesStatus::Ongoing;
        metadata.end_date = FuzzyDate::default();

        let json = SeriesJson::from_series("Vagabond", &metadata, 0);
        assert_eq!(json.metadata.status, "Continuing");
        assert_eq!(json.metadata.publication_run, "3 1998 - 0 0");
    }

    #[test]
    fn test_series_json_serialized_keys() {
        let json = SeriesJson::from_series("Vagabond", &finished_series(), 1);
        let value = serde_json::to_value(&json).unwrap();
        let metadata = &value["metadata"];
        assert_eq!(metadata["type"], "comicSeries");
        assert_eq!(metadata["booktype"], "manga");
        assert_eq!(metadata["comicId"], 0);
        assert!(metadata.get("ComicImage").is_some());
        assert!(metadata.get("description_text").is_some());
    }

    #[test]
    fn test_record_deserializes_without_metadata() {
        let record: SeriesRecord =
            serde_json::from_str(r#"{"id": "abc", "title": "Vagabond"}"#).unwrap();
        assert_eq!(record.metadata, SeriesMetadata::default());
    }
}
