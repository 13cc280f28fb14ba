//! AniList GraphQL catalog client (primary catalog).

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
use serde_json::json;
use tracing::{debug, info};

/// Fields requested for every media object.
const MEDIA_FIELDS: &str = r#"
id
idMal
title { romaji english native }
description(asHtml: false)
tags { name description rank }
genres
coverImage { extraLarge large medium color }
bannerImage
characters(page: 1, perPage: 25) { nodes { name { full } } }
startDate { year month day }
endDate { year month day }
staff { edges { role node { name { full } } } }
status
synonyms
siteUrl
chapters
volumes
countryOfOrigin
externalLinks { url }
format
averageScore
popularity
meanScore
isLicensed
updatedAt
"#;

fn search_query() -> String {
    format!(
        "query ($query: String, $perPage: Int) {{ Page(page: 1, perPage: $perPage) {{ media(search: $query, type: MANGA, sort: [SEARCH_MATCH, POPULARITY_DESC]) {{ {} }} }} }}",
        MEDIA_FIELDS
    )
}

fn by_id_query() -> String {
    format!(
        "query ($id: Int) {{ Media(id: $id, type: MANGA) {{ {} }} }}",
        MEDIA_FIELDS
    )
}

/// Client for the AniList GraphQL API.
pub struct AniListClient {
    http: HttpClient,
    endpoint: String,
}

impl AniListClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_endpoint(http, NetworkConfig::ANILIST_API_URL)
    }

    /// Point the client at a different GraphQL endpoint.
    pub fn with_endpoint(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        query: String,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = self.http.post_json(&self.endpoint, &body).await?;

        if let Some(error) = response.errors.and_then(|errors| errors.into_iter().next()) {
            return Err(TankobonError::Network {
                message: format!("AniList returned an error: {}", error.message),
                cause: error.status.map(|s| s.to_string()),
            });
        }

        response.data.ok_or_else(|| TankobonError::Network {
            message: "AniList response carried no data".to_string(),
            cause: None,
        })
    }
}

#[async_trait]
impl CatalogClient for AniListClient {
    fn catalog(&self) -> CatalogId {
        CatalogId::AniList
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CanonicalRecord>> {
        debug!("Searching AniList for '{}'", query);
        let data: PageData = self
            .execute(
                search_query(),
                json!({ "query": query, "perPage": NetworkConfig::ANILIST_PAGE_SIZE }),
            )
            .await?;

        let records: Vec<CanonicalRecord> = data.page.media.into_iter().map(convert_media).collect();
        info!("AniList returned {} results for '{}'", records.len(), query);
        Ok(records)
    }

    async fn get_by_id(&self, id: &str) -> Result<CanonicalRecord> {
        let numeric: i64 = id.parse().map_err(|_| TankobonError::Validation {
            field: "id".to_string(),
            message: format!("AniList ids are numeric, got '{}'", id),
        })?;

        let data: MediaData = self.execute(by_id_query(), json!({ "id": numeric })).await?;
        data.media
            .map(convert_media)
            .ok_or_else(|| TankobonError::not_found(id, CatalogId::AniList.as_str()))
    }
}

// AniList response types

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: MediaPage,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    media: Vec<AniListMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AniListMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct AniListMedia {
    id: i64,
    title: AniListTitle,
    description: Option<String>,
    tags: Vec<AniListTag>,
    genres: Vec<String>,
    cover_image: Option<AniListCover>,
    banner_image: Option<String>,
    characters: Option<NodeList<NamedNode>>,
    start_date: Option<AniListDate>,
    end_date: Option<AniListDate>,
    staff: Option<EdgeList>,
    status: Option<String>,
    synonyms: Vec<String>,
    site_url: Option<String>,
    chapters: Option<u32>,
    volumes: Option<u32>,
    country_of_origin: Option<String>,
    external_links: Option<Vec<ExternalLink>>,
    format: Option<String>,
    average_score: Option<u32>,
    popularity: Option<u32>,
    mean_score: Option<u32>,
    is_licensed: Option<bool>,
    updated_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AniListTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AniListTag {
    name: String,
    description: Option<String>,
    rank: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AniListCover {
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AniListDate {
    year: Option<u32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NodeList<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    name: FullName,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FullName {
    full: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EdgeList {
    edges: Vec<StaffEdge>,
}

#[derive(Debug, Deserialize)]
struct StaffEdge {
    role: Option<String>,
    node: NamedNode,
}

#[derive(Debug, Deserialize)]
struct ExternalLink {
    url: Option<String>,
}

fn date_of(date: Option<AniListDate>) -> FuzzyDate {
    date.map(|d| FuzzyDate {
        year: d.year.unwrap_or(0),
        month: d.month.unwrap_or(0),
        day: d.day.unwrap_or(0),
    })
    .unwrap_or_default()
}

/// AniList staff roles carry qualifiers ("Story & Art", "Art (assistant)").
/// Keep the base role so the merger can bucket it.
fn base_roles(role: &str) -> Vec<String> {
    let base = role.split('(').next().unwrap_or(role).trim();
    base.split('&')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

pub(super) fn convert_media(media: AniListMedia) -> CanonicalRecord {
    let title = Title {
        romaji: media.title.romaji.unwrap_or_default(),
        english: media.title.english.unwrap_or_default(),
        native: media.title.native.unwrap_or_default(),
    };
    let mut record = CanonicalRecord::new(
        RecordId::new(CatalogId::AniList, media.id.to_string()),
        title,
    );

    record.description = media
        .description
        .map(|d| sanitize_text(&d))
        .unwrap_or_default();
    record.genres = media.genres;
    record.tags = media
        .tags
        .into_iter()
        .filter(|t| !t.name.is_empty())
        .map(|t| Tag {
            name: t.name,
            description: t.description.unwrap_or_default(),
            rank: t.rank.unwrap_or(0),
        })
        .collect();

    if let Some(cover) = media.cover_image {
        record.cover = CoverImage {
            extra_large: cover.extra_large.unwrap_or_default(),
            large: cover.large.unwrap_or_default(),
            medium: cover.medium.unwrap_or_default(),
            color: cover.color.unwrap_or_default(),
        };
    }
    record.banner_image = media.banner_image.unwrap_or_default();

    record.characters = media
        .characters
        .map(|c| c.nodes.into_iter().filter_map(|n| n.name.full).collect())
        .unwrap_or_default();

    record.staff = media
        .staff
        .map(|s| {
            s.edges
                .into_iter()
                .filter_map(|edge| Some((edge.role?, edge.node.name.full?)))
                .flat_map(|(role, name)| {
                    base_roles(&role)
                        .into_iter()
                        .map(move |role| StaffCredit {
                            role,
                            name: name.clone(),
                        })
                })
                .collect()
        })
        .unwrap_or_default();

    record.status = media
        .status
        .as_deref()
        .map(SeriesStatus::from_anilist)
        .unwrap_or_default();
    record.start_date = date_of(media.start_date);
    record.end_date = date_of(media.end_date);
    record.chapters = media.chapters.unwrap_or(0);
    record.volumes = media.volumes.unwrap_or(0);
    record.synonyms = media.synonyms;
    record.site_url = media.site_url.unwrap_or_default();
    record.urls = media
        .external_links
        .unwrap_or_default()
        .into_iter()
        .filter_map(|l| l.url)
        .filter(|u| !u.is_empty())
        .collect();
    if !record.site_url.is_empty() && !record.urls.contains(&record.site_url) {
        record.urls.insert(0, record.site_url.clone());
    }
    record.country = media.country_of_origin.unwrap_or_default();
    record.format = media
        .format
        .as_deref()
        .map(PublicationFormat::from_anilist)
        .unwrap_or_default();
    record.average_score = media.average_score.unwrap_or(0);
    record.popularity = media.popularity.unwrap_or(0);
    record.mean_score = media.mean_score.unwrap_or(0);
    record.is_licensed = media.is_licensed.unwrap_or(false);
    record.updated_at = media.updated_at.unwrap_or(0);

    record
}
