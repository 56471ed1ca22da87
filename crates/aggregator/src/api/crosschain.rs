//! Cross-chain routes. Both take the source and destination chain in the
//! query string and always name a provider.

use {
    super::{AppState, dto, error::ApiError},
    axum::extract::{Json, Query, State},
    model::quote::{MetaPrice, TxQuote},
};

pub(super) async fn price(
    State(state): State<AppState>,
    Query(params): Query<dto::CrossChainPriceParams>,
) -> Result<Json<MetaPrice>, ApiError> {
    let provider = params.provider.clone();
    let query = params.into_query()?;
    Ok(Json(
        state
            .service
            .get_crosschain_provider_price(&provider, &query)
            .await?,
    ))
}

pub(super) async fn quote(
    State(state): State<AppState>,
    Query(params): Query<dto::CrossChainQuoteParams>,
) -> Result<Json<TxQuote>, ApiError> {
    let provider = params.provider.clone();
    let query = params.into_query()?;
    Ok(Json(
        state
            .service
            .get_crosschain_meta_swap_quote(&provider, &query)
            .await?,
    ))
}
