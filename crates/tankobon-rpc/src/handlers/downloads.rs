//! Source search and chapter download handlers.

use super::{get_str_param, require_str_param};
use crate::server::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tankobon_core::ProgressCallback;

pub async fn search_series(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let query = require_str_param(params, "query", "query")?;
    let series = state.api.search_series(&query).await?;
    Ok(serde_json::to_value(series)?)
}

pub async fn list_chapters(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let series_id = require_str_param(params, "series_id", "seriesId")?;
    let query = get_str_param(params, "query", "query");
    let chapters = state.api.list_chapters(&series_id, query).await?;
    Ok(serde_json::to_value(chapters)?)
}

/// Runs the whole chapter pipeline before answering; progress goes to the log.
pub async fn download_chapter(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let series_id = require_str_param(params, "series_id", "seriesId")?;
    let chapter_id = require_str_param(params, "chapter_id", "chapterId")?;

    let label = chapter_id.clone();
    let progress: ProgressCallback =
        Arc::new(move |message: &str| tracing::debug!("[{}] {}", label, message));

    let path = state
        .api
        .download_chapter(&series_id, &chapter_id, Some(progress))
        .await?;
    Ok(json!({
        "success": true,
        "path": path.to_string_lossy(),
    }))
}

pub async fn download_history(state: &AppState, _params: &Value) -> tankobon_core::Result<Value> {
    let entries = state.api.download_history()?;
    Ok(serde_json::to_value(entries)?)
}
