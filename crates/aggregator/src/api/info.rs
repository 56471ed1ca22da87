//! Static descriptor routes: which providers (and spenders) serve which
//! chain.

use {
    super::{AppState, error::ApiError},
    axum::extract::{Json, Path, State},
    errors::AggregationError,
    model::descriptor::ProvidersOnChain,
    serde::Serialize,
};

#[derive(Serialize)]
pub(super) struct ChainProviders {
    chain_id: u64,
    #[serde(flatten)]
    providers: ProvidersOnChain,
}

pub(super) async fn all(State(state): State<AppState>) -> Json<Vec<ChainProviders>> {
    let mut chains: Vec<ChainProviders> = state
        .chains
        .iter()
        .map(|chain| ChainProviders {
            chain_id: chain.chain_id,
            providers: state.descriptors.on_chain(chain.chain_id),
        })
        .filter(|entry| !entry.providers.is_empty())
        .collect();
    chains.sort_by_key(|entry| entry.chain_id);
    Json(chains)
}

pub(super) async fn by_chain(
    State(state): State<AppState>,
    Path(chain_id): Path<u64>,
) -> Result<Json<ChainProviders>, ApiError> {
    if !state.chains.contains(chain_id) {
        return Err(AggregationError::validation(format!("chain {chain_id} is not supported")).into());
    }
    Ok(Json(ChainProviders {
        chain_id,
        providers: state.descriptors.on_chain(chain_id),
    }))
}
