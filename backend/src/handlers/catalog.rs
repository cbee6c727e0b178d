//! HTTP handlers for products and parties

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Party, PartyKind, Product};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::catalog::{CreatePartyInput, CreateProductInput, UpdateProductInput};
use crate::services::CatalogService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyQuery {
    pub kind: Option<PartyKind>,
}

fn catalog_service(state: &AppState) -> CatalogService {
    CatalogService::new(state.store.clone(), state.config.ledger)
}

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let products = catalog_service(&state)
        .list_products(current_user.0, query.include_inactive)
        .await?;
    Ok(Json(products))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = catalog_service(&state)
        .create_product(current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let product = catalog_service(&state)
        .update_product(current_user.0, product_id, input)
        .await?;
    Ok(Json(product))
}

pub async fn list_parties(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PartyQuery>,
) -> AppResult<Json<Vec<Party>>> {
    let parties = catalog_service(&state)
        .list_parties(current_user.0, query.kind)
        .await?;
    Ok(Json(parties))
}

pub async fn create_party(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePartyInput>,
) -> AppResult<(StatusCode, Json<Party>)> {
    let party = catalog_service(&state)
        .create_party(current_user.0, input)
        .await?;
    Ok((StatusCode::CREATED, Json(party)))
}
