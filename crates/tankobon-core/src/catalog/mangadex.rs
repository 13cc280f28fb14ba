//! MangaDex REST catalog client (secondary catalog).
//!
//! Only consulted after the primary catalog is exhausted, or to fill gaps
//! in a primary record. The wire types are shared with the MangaDex source
//! provider.

use super::types::{
    CanonicalRecord, CatalogId, CoverImage, FuzzyDate, PublicationFormat, RecordId, SeriesStatus,
    StaffCredit, Tag, Title,
};
use super::CatalogClient;
use crate::config::NetworkConfig;
use crate::error::{Result, TankobonError};
use crate::naming::sanitize_text;
use crate::network::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Relationship expansions requested with every manga lookup.
const INCLUDES: &str = "includes[]=cover_art&includes[]=author&includes[]=artist";

/// Rank given to MangaDex tags, which carry no relevance score.
const TAG_RANK: u32 = 50;

/// Client for MangaDex's manga endpoints.
pub struct MangaDexCatalog {
    http: HttpClient,
    api_base: String,
}

impl MangaDexCatalog {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base(http, NetworkConfig::MANGADEX_API_BASE)
    }

    pub fn with_base(http: HttpClient, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/manga?title={}&limit={}&{}&order[relevance]=desc",
            self.api_base,
            urlencoding::encode(query),
            NetworkConfig::MANGADEX_CATALOG_LIMIT,
            INCLUDES
        )
    }
}

#[async_trait]
impl CatalogClient for MangaDexCatalog {
    fn catalog(&self) -> CatalogId {
        CatalogId::MangaDex
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        debug!("Searching MangaDex for '{}'", query);
        let list: MangaList = self.http.get_json(&self.search_url(query)).await?;
        list.ensure_ok()?;

        let records: Vec<CanonicalRecord> = list.data.into_iter().map(convert_manga).collect();
        info!("MangaDex returned {} results for '{}'", records.len(), query);
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> Result<CanonicalRecord> {
        let url = format!(
            "{}/manga/{}?{}",
            self.api_base,
            urlencoding::encode(id),
            INCLUDES
        );
        let entity: MangaEntity = self.http.get_json(&url).await.map_err(|e| match e {
            TankobonError::DownloadFailed { ref message, .. } if message.contains("404") => {
                TankobonError::not_found(id, CatalogId::MangaDex.as_str())
            }
            other => other,
        })?;
        Ok(convert_manga(entity.data))
    }
}

// MangaDex response types

/// Localized string map (`{"en": "...", "ja": "..."}`).
pub(crate) type LocalizedString = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
pub(crate) struct MangaList {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub data: Vec<MangaData>,
}

impl MangaList {
    pub(crate) fn ensure_ok(&self) -> Result<()> {
        if self.result.is_empty() || self.result == "ok" {
            Ok(())
        } else {
            Err(TankobonError::Network {
                message: format!("MangaDex answered with result '{}'", self.result),
                cause: Some("api.mangadex.org".to_string()),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct MangaEntity {
    data: MangaData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MangaData {
    pub id: String,
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct MangaAttributes {
    pub title: LocalizedString,
    pub alt_titles: Vec<LocalizedString>,
    pub description: LocalizedString,
    pub original_language: String,
    pub status: Option<String>,
    pub year: Option<u32>,
    pub tags: Vec<MangaTag>,
    pub last_volume: Option<String>,
    pub last_chapter: Option<String>,
    pub links: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MangaTag {
    pub attributes: MangaTagAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MangaTagAttributes {
    pub name: LocalizedString,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RelationshipAttributes {
    pub name: Option<String>,
    pub file_name: Option<String>,
}

impl MangaData {
    /// English title, or the first available one.
    pub(crate) fn main_title(&self) -> String {
        self.attributes
            .title
            .get("en")
            .or_else(|| self.attributes.title.values().next())
            .cloned()
            .unwrap_or_default()
    }

    fn native_title(&self) -> Option<String> {
        self.attributes
            .alt_titles
            .iter()
            .find_map(|t| t.get("ja"))
            .or_else(|| self.attributes.title.get("ja"))
            .cloned()
    }

    fn related<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a RelationshipAttributes> {
        self.relationships
            .iter()
            .filter(move |r| r.kind == kind)
            .filter_map(|r| r.attributes.as_ref())
    }

    fn cover_file(&self) -> Option<&str> {
        self.related("cover_art").find_map(|a| a.file_name.as_deref())
    }
}

fn status_of(status: Option<&str>) -> SeriesStatus {
    match status {
        Some("completed") => SeriesStatus::Completed,
        Some("ongoing") => SeriesStatus::Ongoing,
        Some("hiatus") => SeriesStatus::Hiatus,
        Some("cancelled") => SeriesStatus::Cancelled,
        _ => SeriesStatus::NotYetReleased,
    }
}

fn count_of(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.parse::<f32>().ok())
        .map(|v| v.floor() as u32)
        .unwrap_or(0)
}

pub(crate) fn convert_manga(manga: MangaData) -> CanonicalRecord {
    let english = manga.main_title();
    let native = manga.native_title().unwrap_or_default();
    let mut record = CanonicalRecord::new(
        RecordId::new(CatalogId::MangaDex, manga.id.clone()),
        Title {
            romaji: String::new(),
            english: english.clone(),
            native: native.clone(),
        },
    );

    let attributes = &manga.attributes;
    record.description = attributes
        .description
        .get("en")
        .or_else(|| attributes.description.values().next())
        .map(|d| sanitize_text(d))
        .unwrap_or_default();

    if let Some(file) = manga.cover_file() {
        let url = format!(
            "{}/covers/{}/{}",
            NetworkConfig::MANGADEX_UPLOADS_BASE,
            manga.id,
            file
        );
        record.cover = CoverImage {
            extra_large: url.clone(),
            large: url.clone(),
            medium: url,
            color: String::new(),
        };
    }

    record.tags = attributes
        .tags
        .iter()
        .filter_map(|t| t.attributes.name.get("en"))
        .map(|name| Tag {
            name: name.clone(),
            description: String::new(),
            rank: TAG_RANK,
        })
        .collect();

    record.status = status_of(attributes.status.as_deref());
    record.start_date = FuzzyDate {
        year: attributes.year.unwrap_or(0),
        month: 0,
        day: 0,
    };
    record.chapters = count_of(attributes.last_chapter.as_deref());
    record.volumes = count_of(attributes.last_volume.as_deref());

    let mut synonyms: Vec<String> = Vec::new();
    for alt in &attributes.alt_titles {
        for title in alt.values() {
            if *title != english && *title != native && !synonyms.contains(title) {
                synonyms.push(title.clone());
            }
        }
    }
    record.synonyms = synonyms;

    record.staff = manga
        .related("author")
        .filter_map(|a| a.name.clone())
        .map(|name| StaffCredit {
            role: "Story".to_string(),
            name,
        })
        .chain(
            manga
                .related("artist")
                .filter_map(|a| a.name.clone())
                .map(|name| StaffCredit {
                    role: "Art".to_string(),
                    name,
                }),
        )
        .collect();

    record.country = attributes.original_language.to_uppercase();
    record.site_url = format!("{}/title/{}", NetworkConfig::MANGADEX_SITE_BASE, manga.id);
    record.urls = std::iter::once(record.site_url.clone())
        .chain(
            attributes
                .links
                .iter()
                .flat_map(|links| links.values())
                .filter(|l| l.starts_with("http"))
                .cloned(),
        )
        .collect();
    record.format = PublicationFormat::Manga;

    record
}
