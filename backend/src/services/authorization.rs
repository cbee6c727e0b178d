//! Capability checks applied by the services before touching the store

use shared::{Actor, Order, Party, PartyKind, Tier};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

fn denied(message: String) -> AppError {
    tracing::debug!("Permission denied: {}", message);
    AppError::InsufficientPermissions(message)
}

/// Stock at `tier` owned by `owner_id` may be mutated by the owner or an admin
pub fn require_stock_manager(actor: &Actor, tier: Tier, owner_id: Uuid) -> AppResult<()> {
    if actor.can_manage_stock(tier, owner_id) {
        Ok(())
    } else {
        Err(denied(format!("cannot manage {} stock of {}", tier, owner_id)))
    }
}

/// Stock levels are visible to the owning party and admins
pub fn require_stock_reader(actor: &Actor, tier: Tier, owner_id: Uuid) -> AppResult<()> {
    require_stock_manager(actor, tier, owner_id)
}

/// The party shipping the goods, or an admin
pub fn require_source(actor: &Actor, order: &Order) -> AppResult<()> {
    if actor.is_admin()
        || actor.represents(order.order_type.source_kind(), order.source_owner_id)
    {
        Ok(())
    } else {
        Err(denied(format!(
            "only the source of {} may do this",
            order.order_number
        )))
    }
}

/// The party receiving the goods, or an admin
pub fn require_destination(actor: &Actor, order: &Order) -> AppResult<()> {
    if actor.is_admin()
        || actor.represents(
            order.order_type.destination_kind(),
            order.destination_owner_id,
        )
    {
        Ok(())
    } else {
        Err(denied(format!(
            "only the destination of {} may do this",
            order.order_number
        )))
    }
}

/// Either side of the order, or an admin
pub fn require_party_to(actor: &Actor, order: &Order) -> AppResult<()> {
    if is_party_to(actor, order) {
        Ok(())
    } else {
        Err(denied(format!("not a party to {}", order.order_number)))
    }
}

pub fn is_party_to(actor: &Actor, order: &Order) -> bool {
    actor.is_admin()
        || actor.represents(order.order_type.source_kind(), order.source_owner_id)
        || actor.represents(
            order.order_type.destination_kind(),
            order.destination_owner_id,
        )
}

/// Catalog and party maintenance
pub fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(denied("administrator role required".to_string()))
    }
}

/// Whether the actor may read a party's details
pub fn can_see_party(actor: &Actor, party: &Party) -> bool {
    actor.is_admin()
        || actor.represents(party.kind, party.id)
        || (party.kind == PartyKind::Client
            && party
                .parent_id
                .map_or(false, |parent| actor.represents(PartyKind::Distributor, parent)))
}
