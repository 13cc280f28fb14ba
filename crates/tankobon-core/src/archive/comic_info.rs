//! `ComicInfo.xml` as read by comic readers and servers.

use crate::config::AppConfig;
use crate::error::{Result, TankobonError};
use crate::metadata::SeriesMetadata;
use crate::source::Chapter;
use serde::Serialize;

const XMLNS_XSD: &str = "http://www.w3.org/2001/XMLSchema";
const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename = "ComicInfo", rename_all = "PascalCase")]
pub struct ComicInfo {
    #[serde(rename = "@xmlns:xsd")]
    xmlns_xsd: &'static str,
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'static str,
    pub title: String,
    pub series: String,
    pub number: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub web: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub genre: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tags: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub characters: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub writer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub penciller: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub letterer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub translator: String,
    pub page_count: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub month: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub day: u32,
    pub notes: String,
    pub manga: &'static str,
}

impl ComicInfo {
    pub fn new(
        chapter: &Chapter,
        series_name: &str,
        metadata: &SeriesMetadata,
        page_count: usize,
    ) -> Self {
        Self {
            xmlns_xsd: XMLNS_XSD,
            xmlns_xsi: XMLNS_XSI,
            title: chapter.name.clone(),
            series: series_name.to_string(),
            number: chapter.index,
            web: chapter.url.clone(),
            summary: metadata.summary.clone(),
            count: metadata.chapters,
            genre: metadata.genres.join(","),
            tags: metadata.tags.join(","),
            characters: metadata.characters.join(","),
            writer: metadata.staff.story.join(","),
            penciller: metadata.staff.art.join(","),
            letterer: metadata.staff.lettering.join(","),
            translator: metadata.staff.translation.join(","),
            page_count,
            year: metadata.start_date.year,
            month: metadata.start_date.month,
            day: metadata.start_date.day,
            notes: format!("Downloaded with {}.", AppConfig::APP_NAME),
            manga: "YesAndRightToLeft",
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self).map_err(|e| TankobonError::Xml {
            message: format!("Failed to serialize ComicInfo for '{}': {}", self.title, e),
        })?;
        Ok(format!("{}\n{}", XML_DECLARATION, body))
    }
}
