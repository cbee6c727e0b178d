//! Product catalog and party registry

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    normalize_kenyan_phone, validate_reorder_level, validate_sku, validate_unit_price, Actor,
    Party, PartyKind, Product, StockKey, Tier,
};
use uuid::Uuid;
use validator::Validate;

use super::authorization::{can_see_party, require_admin};
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{with_transaction, Store};

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub flavor: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub sku: String,
    pub unit_price: Decimal,
    pub is_active: Option<bool>,
    /// Warehouse to open a zero-quantity record at
    pub warehouse_id: Option<Uuid>,
    pub reorder_level: Option<i64>,
}

/// Input for updating a product; the SKU cannot change
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub flavor: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Input for registering a warehouse, distributor or client
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartyInput {
    pub kind: PartyKind,
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    pub phone: Option<String>,
    /// Owning distributor; required for clients
    pub parent_id: Option<Uuid>,
}

/// Catalog service
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    ledger: LedgerConfig,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, ledger: LedgerConfig) -> Self {
        Self { store, ledger }
    }

    /// Create a product, optionally opening an empty stock record at a warehouse
    pub async fn create_product(
        &self,
        actor: Actor,
        input: CreateProductInput,
    ) -> AppResult<Product> {
        require_admin(&actor)?;
        input.validate()?;
        validate_sku(&input.sku)?;
        validate_unit_price(input.unit_price)?;
        let reorder_level = input
            .reorder_level
            .unwrap_or(self.ledger.default_reorder_level);
        validate_reorder_level(reorder_level)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            flavor: input.flavor,
            category: input.category,
            sku: input.sku,
            unit_price: input.unit_price,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        let warehouse_id = input.warehouse_id;

        let product = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                uow.insert_product(&product).await?;

                if let Some(warehouse_id) = warehouse_id {
                    let warehouse = uow
                        .party(warehouse_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Party".to_string()))?;
                    if warehouse.kind != PartyKind::Warehouse {
                        return Err(AppError::Validation {
                            field: "warehouse_id".to_string(),
                            message: "party is not a warehouse".to_string(),
                        });
                    }
                    let key = StockKey::new(Tier::Warehouse, warehouse_id, product.id);
                    uow.lock_or_create_quantity(key, reorder_level, now).await?;
                }

                Ok(product)
            })
        })
        .await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Update price, naming or the active flag; existing order lines keep their snapshot
    pub async fn update_product(
        &self,
        actor: Actor,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        require_admin(&actor)?;
        input.validate()?;
        if let Some(price) = input.unit_price {
            validate_unit_price(price)?;
        }

        let now = Utc::now();
        let product = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                let mut product = uow
                    .product(product_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

                if let Some(name) = input.name {
                    product.name = name.trim().to_string();
                }
                if let Some(flavor) = input.flavor {
                    product.flavor = Some(flavor);
                }
                if let Some(category) = input.category {
                    product.category = Some(category);
                }
                if let Some(price) = input.unit_price {
                    product.unit_price = price;
                }
                if let Some(is_active) = input.is_active {
                    product.is_active = is_active;
                }
                product.updated_at = now;

                uow.update_product(&product).await?;
                Ok(product)
            })
        })
        .await?;

        tracing::info!(
            product_id = %product.id,
            unit_price = %product.unit_price,
            is_active = product.is_active,
            "Product updated"
        );
        Ok(product)
    }

    /// Inactive products are listed for admins only
    pub async fn list_products(
        &self,
        actor: Actor,
        include_inactive: bool,
    ) -> AppResult<Vec<Product>> {
        let include_inactive = include_inactive && actor.is_admin();
        with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move { uow.list_products(include_inactive).await })
        })
        .await
    }

    /// Register a party; clients must name the distributor they buy from
    pub async fn create_party(&self, actor: Actor, input: CreatePartyInput) -> AppResult<Party> {
        require_admin(&actor)?;
        input.validate()?;

        let phone = match input.phone.as_deref() {
            Some(raw) => Some(normalize_kenyan_phone(raw).ok_or_else(|| AppError::Validation {
                field: "phone".to_string(),
                message: "Invalid Kenyan mobile number".to_string(),
            })?),
            None => None,
        };

        match (input.kind, input.parent_id) {
            (PartyKind::Client, None) => {
                return Err(AppError::Validation {
                    field: "parent_id".to_string(),
                    message: "clients belong to a distributor".to_string(),
                })
            }
            (PartyKind::Warehouse | PartyKind::Distributor, Some(_)) => {
                return Err(AppError::Validation {
                    field: "parent_id".to_string(),
                    message: "only clients have a parent".to_string(),
                })
            }
            _ => {}
        }

        let party = Party {
            id: Uuid::new_v4(),
            kind: input.kind,
            name: input.name.trim().to_string(),
            phone,
            parent_id: input.parent_id,
            created_at: Utc::now(),
        };

        let party = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move {
                if let Some(parent_id) = party.parent_id {
                    let parent = uow
                        .party(parent_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Party".to_string()))?;
                    if parent.kind != PartyKind::Distributor {
                        return Err(AppError::Validation {
                            field: "parent_id".to_string(),
                            message: "parent must be a distributor".to_string(),
                        });
                    }
                }
                uow.insert_party(&party).await?;
                Ok(party)
            })
        })
        .await?;

        tracing::info!(party_id = %party.id, kind = %party.kind, "Party registered");
        Ok(party)
    }

    /// Parties visible to the actor, optionally of one kind
    pub async fn list_parties(
        &self,
        actor: Actor,
        kind: Option<PartyKind>,
    ) -> AppResult<Vec<Party>> {
        let parties = with_transaction(self.store.as_ref(), move |uow| {
            Box::pin(async move { uow.list_parties(kind).await })
        })
        .await?;

        Ok(parties
            .into_iter()
            .filter(|p| can_see_party(&actor, p))
            .collect())
    }
}
