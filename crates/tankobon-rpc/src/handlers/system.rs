//! Settings and cache maintenance handlers.

use crate::server::AppState;
use serde_json::{json, Value};

pub async fn get_settings(state: &AppState, _params: &Value) -> tankobon_core::Result<Value> {
    Ok(serde_json::to_value(state.api.get_settings())?)
}

pub async fn cache_stats(state: &AppState, _params: &Value) -> tankobon_core::Result<Value> {
    let stats = state.api.cache_stats()?;
    Ok(serde_json::to_value(stats)?)
}

pub async fn cleanup_cache(state: &AppState, _params: &Value) -> tankobon_core::Result<Value> {
    let removed = state.api.cleanup_cache()?;
    Ok(json!({"removed": removed}))
}

pub async fn clear_resolution_cache(
    state: &AppState,
    _params: &Value,
) -> tankobon_core::Result<Value> {
    let removed = state.api.clear_resolution_cache()?;
    Ok(json!({"removed": removed}))
}
