//! Single-chain market-order routes.

use {
    super::{AppState, dto, error::ApiError},
    axum::extract::{Json, Path, Query, State},
    errors::{AggregationError, ErrorKind},
    model::quote::{MetaPrice, TxQuote},
};

/// Best price across providers, or the named provider's price when the
/// `provider` query parameter is present.
pub(super) async fn price(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
    Query(params): Query<dto::PriceParams>,
) -> Result<Json<MetaPrice>, ApiError> {
    let provider = params.provider.clone();
    let query = params.into_query(chain_id)?;
    let result = match provider {
        Some(provider) => state.service.get_provider_price(&provider, &query).await?,
        None => {
            let prices = state.service.get_meta_price(&query).await?;
            prices
                .into_iter()
                .find(|price| price.is_best == Some(true))
                .ok_or_else(|| {
                    AggregationError::new(ErrorKind::ProviderUnspecified, "No prices found")
                })?
        }
    };
    Ok(Json(result))
}

pub(super) async fn all_prices(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
    Query(params): Query<dto::PriceParams>,
) -> Result<Json<Vec<MetaPrice>>, ApiError> {
    let query = params.into_query(chain_id)?;
    Ok(Json(state.service.get_meta_price(&query).await?))
}

pub(super) async fn quote(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
    Query(params): Query<dto::QuoteParams>,
) -> Result<Json<TxQuote>, ApiError> {
    let provider = params.provider.clone();
    let query = params.into_query(chain_id)?;
    Ok(Json(
        state.service.get_meta_swap_quote(&provider, &query).await?,
    ))
}
