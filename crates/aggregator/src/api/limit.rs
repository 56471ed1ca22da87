//! Limit-order routes, forwarding through the capability-gated facade.

use {
    super::{AppState, dto, error::ApiError},
    axum::extract::{Json, Path, Query, State},
    serde_json::Value,
};

pub(super) async fn by_trader(
    State(state): State<AppState>,
    Path((chain_id, trader)): Path<(u64, String)>,
    Query(params): Query<dto::LimitOrderListParams>,
) -> Result<Json<Value>, ApiError> {
    let trader = dto::parse_trader(&trader)?;
    let (maker_token, taker_token) = params.tokens()?;
    let statuses = params.statuses();
    Ok(Json(
        state
            .limit_orders
            .list_by_trader(
                chain_id,
                &params.provider,
                trader,
                maker_token,
                taker_token,
                statuses,
            )
            .await?,
    ))
}

pub(super) async fn by_hash(
    State(state): State<AppState>,
    Path((chain_id, order_hash)): Path<(u64, String)>,
    Query(params): Query<dto::LimitOrderProviderParams>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(
        state
            .limit_orders
            .get_by_hash(chain_id, &params.provider, &order_hash)
            .await?,
    ))
}

pub(super) async fn submit(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
    Json(body): Json<dto::LimitOrderBody>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(
        state
            .limit_orders
            .submit(
                chain_id,
                &body.provider,
                &body.order_hash,
                &body.signature,
                &body.data,
            )
            .await?,
    ))
}
