//! HTTP handlers for inventory ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{InventoryTransaction, QuantityRecord, ReconciliationReport, Tier};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{AdjustInput, LedgerReceipt, ReorderLevelInput, RestockInput};
use crate::services::LedgerService;
use crate::store::TransactionFilter;
use crate::AppState;

fn ledger_service(state: &AppState) -> LedgerService {
    LedgerService::new(state.store.clone(), state.config.ledger)
}

/// Restock a product
pub async fn restock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RestockInput>,
) -> AppResult<Json<LedgerReceipt>> {
    let receipt = ledger_service(&state)
        .restock(current_user.0, input)
        .await?;
    Ok(Json(receipt))
}

/// Apply a manual stock correction
pub async fn adjust(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustInput>,
) -> AppResult<Json<LedgerReceipt>> {
    let receipt = ledger_service(&state).adjust(current_user.0, input).await?;
    Ok(Json(receipt))
}

/// Change a reorder level
pub async fn set_reorder_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReorderLevelInput>,
) -> AppResult<Json<QuantityRecord>> {
    let record = ledger_service(&state)
        .set_reorder_level(current_user.0, input)
        .await?;
    Ok(Json(record))
}

/// Stock levels of one owner
pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((tier, owner_id)): Path<(String, Uuid)>,
) -> AppResult<Json<Vec<QuantityRecord>>> {
    let tier: Tier = tier.parse()?;
    let records = ledger_service(&state)
        .stock(current_user.0, tier, owner_id)
        .await?;
    Ok(Json(records))
}

/// Records at or below their reorder level
pub async fn get_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((tier, owner_id)): Path<(String, Uuid)>,
) -> AppResult<Json<Vec<QuantityRecord>>> {
    let tier: Tier = tier.parse()?;
    let records = ledger_service(&state)
        .low_stock(current_user.0, tier, owner_id)
        .await?;
    Ok(Json(records))
}

/// Compare quantity records with the transaction log
pub async fn reconcile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((tier, owner_id)): Path<(String, Uuid)>,
) -> AppResult<Json<ReconciliationReport>> {
    let tier: Tier = tier.parse()?;
    let report = ledger_service(&state)
        .reconcile(current_user.0, tier, owner_id)
        .await?;
    Ok(Json(report))
}

/// Transaction history
pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Vec<InventoryTransaction>>> {
    let transactions = ledger_service(&state)
        .history(current_user.0, filter)
        .await?;
    Ok(Json(transactions))
}
