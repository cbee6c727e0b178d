//! Parties in the distribution chain and the acting identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inventory::Tier;

/// Kind of party that can own stock or place orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "party_kind", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum PartyKind {
    Warehouse,
    Distributor,
    Client,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Warehouse => "WAREHOUSE",
            PartyKind::Distributor => "DISTRIBUTOR",
            PartyKind::Client => "CLIENT",
        }
    }

    /// Tier at which this kind of party holds tracked stock
    pub fn tier(&self) -> Option<Tier> {
        match self {
            PartyKind::Warehouse => Some(Tier::Warehouse),
            PartyKind::Distributor => Some(Tier::Distributor),
            PartyKind::Client => None,
        }
    }
}

impl std::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartyKind::Warehouse => write!(f, "Warehouse"),
            PartyKind::Distributor => write!(f, "Distributor"),
            PartyKind::Client => write!(f, "Client"),
        }
    }
}

/// A warehouse, distributor or client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Party {
    pub id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub phone: Option<String>,
    /// Distributor a client belongs to
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Role claimed by an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    /// Staff of one warehouse
    Warehouse,
    Distributor,
    Client,
}

/// Pre-validated identity handed to the core by the authentication layer.
///
/// `owner_id` is the party the user acts for; admins act for nobody and may
/// act on everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub owner_id: Option<Uuid>,
}

impl Actor {
    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            owner_id: None,
        }
    }

    pub fn acting_for(user_id: Uuid, role: Role, owner_id: Uuid) -> Self {
        Self {
            user_id,
            role,
            owner_id: Some(owner_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the actor acts for `owner_id` in the given role
    pub fn acts_as(&self, role: Role, owner_id: Uuid) -> bool {
        self.role == role && self.owner_id == Some(owner_id)
    }

    /// Whether the actor may mutate the stock of `owner_id` at `tier`
    pub fn can_manage_stock(&self, tier: Tier, owner_id: Uuid) -> bool {
        if self.is_admin() {
            return true;
        }
        match tier {
            Tier::Warehouse => self.acts_as(Role::Warehouse, owner_id),
            Tier::Distributor => self.acts_as(Role::Distributor, owner_id),
        }
    }

    /// Whether the actor is the given party, whatever its kind
    pub fn represents(&self, kind: PartyKind, owner_id: Uuid) -> bool {
        let role = match kind {
            PartyKind::Warehouse => Role::Warehouse,
            PartyKind::Distributor => Role::Distributor,
            PartyKind::Client => Role::Client,
        };
        self.acts_as(role, owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_manages_any_stock() {
        let admin = Actor::admin(Uuid::new_v4());
        assert!(admin.can_manage_stock(Tier::Warehouse, Uuid::new_v4()));
        assert!(admin.can_manage_stock(Tier::Distributor, Uuid::new_v4()));
    }

    #[test]
    fn test_distributor_manages_only_own_stock() {
        let own = Uuid::new_v4();
        let actor = Actor::acting_for(Uuid::new_v4(), Role::Distributor, own);
        assert!(actor.can_manage_stock(Tier::Distributor, own));
        assert!(!actor.can_manage_stock(Tier::Distributor, Uuid::new_v4()));
        assert!(!actor.can_manage_stock(Tier::Warehouse, own));
    }

    #[test]
    fn test_client_manages_no_stock() {
        let own = Uuid::new_v4();
        let actor = Actor::acting_for(Uuid::new_v4(), Role::Client, own);
        assert!(!actor.can_manage_stock(Tier::Distributor, own));
        assert!(actor.represents(PartyKind::Client, own));
    }
}
