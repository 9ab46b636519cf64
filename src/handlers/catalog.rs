use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::error::AppResult;
use crate::AppState;

pub async fn get_contract(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<Value>> {
    let contract = state.catalog.contract(&address).await?;
    Ok(Json(contract))
}

pub async fn get_collection(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let collection = state.catalog.collection(&slug).await?;
    Ok(Json(collection))
}

pub async fn get_collection_stats(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let stats = state.catalog.collection_stats(&slug).await?;
    Ok(Json(stats))
}
