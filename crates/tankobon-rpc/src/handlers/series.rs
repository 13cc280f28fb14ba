//! Resolution and stored-series handlers.

use super::require_str_param;
use crate::server::AppState;
use serde_json::{json, Value};

pub async fn resolve_series(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let name = require_str_param(params, "name", "name")?;
    let record = state.api.resolve_series(&name).await?;
    Ok(serde_json::to_value(record)?)
}

pub async fn resolve_record(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let id = require_str_param(params, "id", "id")?;
    let record = state.api.resolve_record(&id).await?;
    Ok(serde_json::to_value(record)?)
}

pub async fn forget_resolution(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let name = require_str_param(params, "name", "name")?;
    let forgotten = state.api.forget_resolution(&name)?;
    Ok(json!({"forgotten": forgotten}))
}

pub async fn search_catalog(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let query = require_str_param(params, "query", "query")?;
    let records = state.api.search_catalog(&query).await?;
    Ok(serde_json::to_value(records)?)
}

pub async fn get_series(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let local_id = require_str_param(params, "local_id", "localId")?;
    let series = state.api.get_series(&local_id)?;
    Ok(serde_json::to_value(series)?)
}

pub async fn find_series(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let name = require_str_param(params, "name", "name")?;
    let series = state.api.find_series(&name)?;
    Ok(serde_json::to_value(series)?)
}

pub async fn list_series(state: &AppState, _params: &Value) -> tankobon_core::Result<Value> {
    let series = state.api.list_series()?;
    Ok(serde_json::to_value(series)?)
}

pub async fn delete_series(state: &AppState, params: &Value) -> tankobon_core::Result<Value> {
    let local_id = require_str_param(params, "local_id", "localId")?;
    let deleted = state.api.delete_series(&local_id)?;
    Ok(json!({"deleted": deleted}))
}
