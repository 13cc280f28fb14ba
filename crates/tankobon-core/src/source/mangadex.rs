//! MangaDex as a chapter source.

use super::model::{sort_chapters, Chapter, LocalSeries, Page};
use super::SourceProvider;
use crate::catalog::mangadex::{convert_manga, MangaData, MangaList};
use crate::config::{DownloadConfig, NetworkConfig};
use crate::error::{Result, TankobonError};
use crate::metadata::{merge_record, SeriesMetadata};
use crate::network::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const SOURCE_ID: &str = "mangadex";
const SOURCE_NAME: &str = "MangaDex";

const CONTENT_RATINGS: &str = "contentRating[]=safe&contentRating[]=suggestive";
const INCLUDES: &str = "includes[]=cover_art&includes[]=author&includes[]=artist";

/// Language value that disables the translated-language filter.
const ANY_LANGUAGE: &str = "any";

/// Searches MangaDex, lists chapter feeds and resolves page URLs through the
/// at-home delivery network.
pub struct MangaDexProvider {
    http: HttpClient,
    api_base: String,
    language: String,
}

impl MangaDexProvider {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base(http, NetworkConfig::MANGADEX_API_BASE)
    }

    pub fn with_base(http: HttpClient, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            language: DownloadConfig::DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Only list chapters translated to `language` ("any" lists all).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/manga?title={}&limit={}&{}&order[followedCount]=desc&{}",
            self.api_base,
            urlencoding::encode(query),
            NetworkConfig::MANGADEX_SEARCH_LIMIT,
            INCLUDES,
            CONTENT_RATINGS
        )
    }

    fn feed_url(&self, manga_id: &str, offset: u32) -> String {
        let mut url = format!(
            "{}/manga/{}/feed?limit={}&offset={}&order[chapter]=asc&{}",
            self.api_base,
            urlencoding::encode(manga_id),
            NetworkConfig::MANGADEX_FEED_PAGE_SIZE,
            offset,
            CONTENT_RATINGS
        );
        if self.language != ANY_LANGUAGE {
            url.push_str(&format!(
                "&translatedLanguage[]={}",
                urlencoding::encode(&self.language)
            ));
        }
        url
    }

    fn wants_language(&self, language: &str) -> bool {
        self.language == ANY_LANGUAGE || self.language == language
    }
}

#[async_trait]
impl SourceProvider for MangaDexProvider {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str) -> Result<Vec<Arc<LocalSeries>>> {
        let list: MangaList = self.http.get_json(&self.search_url(query)).await?;
        list.ensure_ok()?;

        let series: Vec<Arc<LocalSeries>> = list.data.into_iter().map(series_from).collect();
        info!("MangaDex source found {} series for '{}'", series.len(), query);
        Ok(series)
    }

    async fn chapters_of(&self, series: &Arc<LocalSeries>) -> Result<Vec<Chapter>> {
        let mut chapters = Vec::new();
        let mut offset = 0;
        let mut next_index = 1;

        loop {
            let page: ChapterFeed = self.http.get_json(&self.feed_url(&series.id, offset)).await?;
            if page.result != "ok" && !page.result.is_empty() {
                return Err(TankobonError::Network {
                    message: format!("MangaDex feed for '{}' answered '{}'", series.name, page.result),
                    cause: Some(SOURCE_ID.to_string()),
                });
            }

            let fetched = page.data.len() as u32;
            for entry in page.data {
                // External chapters have no pages to download.
                if entry.attributes.external_url.is_some()
                    || !self.wants_language(&entry.attributes.translated_language)
                {
                    continue;
                }
                chapters.push(chapter_from(series, entry, next_index));
                next_index += 1;
            }

            offset += NetworkConfig::MANGADEX_FEED_PAGE_SIZE;
            if fetched == 0 || offset >= page.total {
                break;
            }
        }

        sort_chapters(&mut chapters);
        debug!("Listed {} chapters for '{}'", chapters.len(), series.name);
        series.set_chapters(chapters.clone());
        Ok(chapters)
    }

    async fn pages_of(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        let url = format!(
            "{}/at-home/server/{}",
            self.api_base,
            urlencoding::encode(&chapter.id)
        );
        let server: AtHomeServer = self.http.get_json(&url).await?;
        Ok(server.pages())
    }
}

fn series_from(manga: MangaData) -> Arc<LocalSeries> {
    let id = manga.id.clone();
    let name = manga.main_title();
    let record = convert_manga(manga);

    let mut metadata = SeriesMetadata::default();
    merge_record(&record, &mut metadata);

    LocalSeries::new(id, name, record.site_url.clone())
        .with_source(SOURCE_ID, SOURCE_NAME)
        .with_metadata(metadata)
        .into_shared()
}

fn chapter_from(series: &Arc<LocalSeries>, entry: ChapterData, index: u32) -> Chapter {
    let attributes = entry.attributes;
    let title = attributes.title.unwrap_or_default();
    let number = attributes.chapter.unwrap_or_default();

    let name = match (number.is_empty(), title.is_empty()) {
        (false, false) => format!("Chapter {} - {}", number, title),
        (false, true) => format!("Chapter {}", number),
        (true, false) => title,
        (true, true) => "Oneshot".to_string(),
    };
    let volume = attributes
        .volume
        .filter(|v| !v.is_empty())
        .map(|v| format!("Vol.{}", v))
        .unwrap_or_default();

    Chapter::new(series, entry.id.clone(), name, index)
        .with_url(format!("{}/chapter/{}", NetworkConfig::MANGADEX_SITE_BASE, entry.id))
        .with_volume(volume)
}

#[derive(Debug, Deserialize)]
struct ChapterFeed {
    #[serde(default)]
    result: String,
    #[serde(default)]
    data: Vec<ChapterData>,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    #[serde(default)]
    attributes: ChapterAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChapterAttributes {
    title: Option<String>,
    chapter: Option<String>,
    volume: Option<String>,
    translated_language: String,
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeServer {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
}

impl AtHomeServer {
    fn pages(&self) -> Vec<Page> {
        let base = self.base_url.trim_end_matches('/');
        self.chapter
            .data
            .iter()
            .enumerate()
            .map(|(i, file)| {
                Page::new(format!("{}/data/{}/{}", base, self.chapter.hash, file), i + 1)
            })
            .collect()
    }
}
