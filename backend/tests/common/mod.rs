//! Shared fixtures for the integration tests: a memory store seeded with one
//! warehouse, one distributor and one of its clients

#![allow(dead_code)]

use std::sync::Arc;

use distribution_ledger_backend::{
    config::Config,
    services::{
        catalog::{CreatePartyInput, CreateProductInput},
        ledger::RestockInput,
        orders::CreateOrderInput,
        payments::RecordPaymentInput,
        CatalogService, FulfillmentEngine, LedgerService, OrderService, PaymentGate,
    },
    store::TransactionFilter,
    MemoryStore, Store,
};
use rust_decimal::Decimal;
use shared::{
    Actor, InventoryTransaction, Order, OrderLineInput, OrderType, OrderWithItems, Party,
    PartyKind, PaymentMethod, PaymentRecordStatus, Product, Role, Tier,
};
use uuid::Uuid;

pub struct Fixture {
    pub store: MemoryStore,
    pub config: Config,
    pub admin: Actor,
    pub warehouse: Party,
    pub distributor: Party,
    pub client: Party,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = MemoryStore::new();
        let admin = Actor::admin(Uuid::new_v4());
        let catalog = CatalogService::new(Arc::new(store.clone()), config.ledger);

        let warehouse = catalog
            .create_party(admin, party(PartyKind::Warehouse, "Central Warehouse", None))
            .await
            .unwrap();
        let distributor = catalog
            .create_party(admin, party(PartyKind::Distributor, "Nakuru Depot", None))
            .await
            .unwrap();
        let client = catalog
            .create_party(
                admin,
                party(PartyKind::Client, "Mama Njeri Shop", Some(distributor.id)),
            )
            .await
            .unwrap();

        Self {
            store,
            config,
            admin,
            warehouse,
            distributor,
            client,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.store(), self.config.ledger)
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.store(), self.config.orders)
    }

    pub fn fulfillment(&self) -> FulfillmentEngine {
        FulfillmentEngine::new(self.store(), self.config.ledger)
    }

    pub fn payments(&self) -> PaymentGate {
        PaymentGate::new(self.store())
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.store(), self.config.ledger)
    }

    pub fn warehouse_staff(&self) -> Actor {
        Actor::acting_for(Uuid::new_v4(), Role::Warehouse, self.warehouse.id)
    }

    pub fn distributor_actor(&self) -> Actor {
        Actor::acting_for(Uuid::new_v4(), Role::Distributor, self.distributor.id)
    }

    pub fn client_actor(&self) -> Actor {
        Actor::acting_for(Uuid::new_v4(), Role::Client, self.client.id)
    }

    pub async fn product(&self, sku: &str, unit_price: Decimal) -> Product {
        self.catalog()
            .create_product(
                self.admin,
                CreateProductInput {
                    name: format!("Juice {}", sku),
                    flavor: Some("Mango".to_string()),
                    category: Some("Juice".to_string()),
                    sku: sku.to_string(),
                    unit_price,
                    is_active: None,
                    warehouse_id: None,
                    reorder_level: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn restock_warehouse(&self, product_id: Uuid, quantity: i64) {
        self.ledger()
            .restock(
                self.admin,
                RestockInput {
                    tier: Tier::Warehouse,
                    owner_id: self.warehouse.id,
                    product_id,
                    quantity,
                    notes: Some("Opening stock".to_string()),
                },
            )
            .await
            .unwrap();
    }

    pub async fn restock_distributor(&self, product_id: Uuid, quantity: i64) {
        self.ledger()
            .restock(
                self.admin,
                RestockInput {
                    tier: Tier::Distributor,
                    owner_id: self.distributor.id,
                    product_id,
                    quantity,
                    notes: None,
                },
            )
            .await
            .unwrap();
    }

    /// Warehouse-to-distributor order placed by the distributor
    pub async fn place_w2d(&self, lines: &[(Uuid, i64)]) -> OrderWithItems {
        self.orders()
            .create_order(
                self.distributor_actor(),
                order_input(
                    OrderType::WarehouseToDistributor,
                    self.warehouse.id,
                    self.distributor.id,
                    lines,
                ),
            )
            .await
            .unwrap()
    }

    /// Distributor-to-client order placed by the client
    pub async fn place_d2c(&self, lines: &[(Uuid, i64)]) -> OrderWithItems {
        self.orders()
            .create_order(
                self.client_actor(),
                order_input(
                    OrderType::DistributorToClient,
                    self.distributor.id,
                    self.client.id,
                    lines,
                ),
            )
            .await
            .unwrap()
    }

    pub async fn pay(&self, order: &Order, amount: Decimal) -> Order {
        self.payments()
            .record_payment(self.admin, order.id, cash(amount))
            .await
            .unwrap()
            .order
    }

    pub async fn pay_in_full(&self, order: &Order) -> Order {
        self.pay(order, order.total_amount).await
    }

    pub async fn quantity(&self, tier: Tier, owner_id: Uuid, product_id: Uuid) -> i64 {
        self.ledger()
            .stock(self.admin, tier, owner_id)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.product_id == product_id)
            .map_or(0, |r| r.quantity)
    }

    pub async fn warehouse_qty(&self, product_id: Uuid) -> i64 {
        self.quantity(Tier::Warehouse, self.warehouse.id, product_id)
            .await
    }

    pub async fn distributor_qty(&self, product_id: Uuid) -> i64 {
        self.quantity(Tier::Distributor, self.distributor.id, product_id)
            .await
    }

    pub async fn order_transactions(&self, order_id: Uuid) -> Vec<InventoryTransaction> {
        self.ledger()
            .history(self.admin, TransactionFilter::for_order(order_id))
            .await
            .unwrap()
    }

    pub async fn current(&self, order_id: Uuid) -> Order {
        self.orders()
            .get_order(self.admin, order_id)
            .await
            .unwrap()
            .order
    }
}

pub fn party(kind: PartyKind, name: &str, parent_id: Option<Uuid>) -> CreatePartyInput {
    CreatePartyInput {
        kind,
        name: name.to_string(),
        phone: None,
        parent_id,
    }
}

pub fn order_input(
    order_type: OrderType,
    source_owner_id: Uuid,
    destination_owner_id: Uuid,
    lines: &[(Uuid, i64)],
) -> CreateOrderInput {
    CreateOrderInput {
        order_type,
        source_owner_id,
        destination_owner_id,
        items: lines
            .iter()
            .map(|&(product_id, quantity)| OrderLineInput {
                product_id,
                quantity,
            })
            .collect(),
        notes: None,
    }
}

pub fn cash(amount: Decimal) -> RecordPaymentInput {
    RecordPaymentInput {
        amount,
        payment_method: PaymentMethod::Cash,
        status: PaymentRecordStatus::Completed,
        mpesa_receipt_number: None,
        mpesa_phone: None,
        notes: None,
    }
}
