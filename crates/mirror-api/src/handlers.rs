//! HTTP handlers over the replicated pools.

use alloy_primitives::Address;
use axum::extract::{Path, Query, State};
use axum::Json;
use mirror_core::types::{
    AmountOutResult, MarketOrder, Order, OrderBookSnapshot, OrderType, PoolInfo,
};
use mirror_core::MirrorError;
use serde::Deserialize;
use std::sync::Arc;

use crate::directory::PoolView;
use crate::server::ApiState;
use crate::{ApiError, Result};

#[derive(Debug, Default, Deserialize)]
pub struct DepthQuery {
    pub depth: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountOutQuery {
    pub order_type: Option<String>,
    pub amount: Option<String>,
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid pool address: {}", address)))
}

fn lookup(state: &ApiState, address: &str) -> Result<Arc<dyn PoolView>> {
    let parsed = parse_address(address)?;
    state
        .directory
        .pool(&parsed)
        .ok_or_else(|| MirrorError::PoolNotFound(parsed).into())
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn list_pools(State(state): State<ApiState>) -> Result<Json<Vec<PoolInfo>>> {
    Ok(Json(state.directory.all_pools().await?))
}

pub async fn pool_info(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<PoolInfo>> {
    Ok(Json(lookup(&state, &address)?.pool_info()))
}

pub async fn order_book(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<OrderBookSnapshot>> {
    let pool = lookup(&state, &address)?;
    // unparsable or zero depth falls back to the default
    let depth = query
        .depth
        .as_deref()
        .and_then(|d| d.trim().parse::<usize>().ok())
        .filter(|d| *d > 0)
        .unwrap_or(state.config.default_depth)
        .min(state.config.max_depth);
    Ok(Json(pool.order_book(depth)))
}

pub async fn order(
    State(state): State<ApiState>,
    Path((address, id)): Path<(String, String)>,
) -> Result<Json<Order>> {
    let pool = lookup(&state, &address)?;
    match pool.order(&id) {
        Some(order) => Ok(Json(order)),
        None => Err(MirrorError::OrderNotFound(parse_address(&address)?, id).into()),
    }
}

pub async fn user_orders(
    State(state): State<ApiState>,
    Path((address, trader)): Path<(String, String)>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(lookup(&state, &address)?.user_orders(&trader)))
}

pub async fn user_market_orders(
    State(state): State<ApiState>,
    Path((address, trader)): Path<(String, String)>,
) -> Result<Json<Vec<MarketOrder>>> {
    Ok(Json(lookup(&state, &address)?.user_market_orders(&trader)))
}

pub async fn amount_out(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Query(query): Query<AmountOutQuery>,
) -> Result<Json<AmountOutResult>> {
    let pool = lookup(&state, &address)?;

    let order_type: OrderType = query
        .order_type
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("orderType is required".to_string()))?
        .parse()
        .map_err(ApiError::BadRequest)?;
    let amount = query
        .amount
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("amount is required".to_string()))?;

    Ok(Json(pool.amount_out(order_type, amount)))
}
