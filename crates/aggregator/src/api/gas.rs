use {
    super::{AppState, error::ApiError},
    axum::extract::{Json, Path, State},
    model::gas::GasReport,
};

pub(super) async fn gas_prices(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
) -> Result<Json<GasReport>, ApiError> {
    Ok(Json(state.gas.gas_prices(chain_id).await?))
}
