//! Shared fixtures for the payment flow tests

use billing_core::{
    BillingConfig, Cart, DomainConfig, Invoice, ItemConfig, LineItem, MemoryCatalog, MemoryStore, Order,
    OrderId, OrderStatus, Pricing, Product, ProductId, ProductType, Repositories, Transaction, UserId,
};
use billing_fulfillment::{ContactDefaults, MockRegistrar};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::checkout::PaymentConfirmation;
use crate::gateway::MockGateway;
use crate::services::{Adapters, BillingServices};
use crate::signature;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct Harness {
    pub services: BillingServices,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub registrar: Arc<MockRegistrar>,

    /// Domain registration at 800 a year
    pub domain_product: ProductId,

    /// Hosting at 199 a month, nothing to provision
    pub hosting_product: ProductId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(MockRegistrar::new(), BillingConfig::default(), Some(WEBHOOK_SECRET)).await
    }

    pub async fn with_registrar(registrar: MockRegistrar) -> Self {
        Self::build(registrar, BillingConfig::default(), Some(WEBHOOK_SECRET)).await
    }

    pub async fn build(registrar: MockRegistrar, config: BillingConfig, webhook_secret: Option<&str>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let catalog = MemoryCatalog::new();
        let domain = catalog
            .insert(Product::new(
                "Domain Registration",
                ProductType::Domain,
                Pricing {
                    monthly: None,
                    yearly: Some(dec!(800)),
                },
            ))
            .await
            .unwrap();
        let hosting = catalog
            .insert(Product::new(
                "Starter Hosting",
                ProductType::Hosting,
                Pricing {
                    monthly: Some(dec!(199)),
                    yearly: None,
                },
            ))
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        let registrar = Arc::new(registrar);
        let (services, _processor) = BillingServices::assemble(
            config,
            Repositories::from_store(store.clone()),
            Arc::new(catalog),
            Adapters {
                gateway: gateway.clone(),
                registrar: registrar.clone(),
                webhook_secret: webhook_secret.map(str::to_string),
                contact_defaults: ContactDefaults::default(),
            },
        );

        Self {
            services,
            store,
            gateway,
            registrar,
            domain_product: domain.id,
            hosting_product: hosting.id,
        }
    }

    pub async fn add_domain(&self, user: &UserId, name: &str) -> Cart {
        self.services
            .carts
            .add_item(
                user,
                self.domain_product,
                1,
                Some(ItemConfig::Domain(DomainConfig::new(name, 1))),
            )
            .await
            .unwrap()
    }

    pub async fn add_hosting(&self, user: &UserId) -> Cart {
        self.services
            .carts
            .add_item(user, self.hosting_product, 1, None)
            .await
            .unwrap()
    }

    /// What the browser would post back after paying `order_ref`
    pub fn confirmation(&self, order_ref: &str, payment_ref: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_order_ref: order_ref.into(),
            gateway_payment_ref: payment_ref.into(),
            signature: self.gateway.sign(order_ref, payment_ref),
        }
    }

    pub async fn transaction(&self, order_ref: &str) -> Transaction {
        self.services.ledger.find(order_ref).await.unwrap()
    }

    pub async fn invoices_of(&self, user: &UserId) -> Vec<Invoice> {
        let client = self.services.repos.clients.find_by_user(user).await.unwrap().unwrap();
        self.services.repos.invoices.list_by_client(&client.id).await.unwrap()
    }

    pub async fn orders_of(&self, user: &UserId) -> Vec<Order> {
        let client = self.services.repos.clients.find_by_user(user).await.unwrap().unwrap();
        self.services.repos.orders.list_by_client(&client.id).await.unwrap()
    }

    pub async fn order(&self, id: &OrderId) -> Order {
        self.services.repos.orders.get(id).await.unwrap().unwrap()
    }

    /// Poll until the background processor moves the order to `status`
    pub async fn wait_for_order(&self, id: &OrderId, status: OrderStatus) -> Order {
        for _ in 0..200 {
            let order = self.order(id).await;
            if order.status == status {
                return order;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("order {id} never reached {status:?}");
    }
}

pub fn domain_item(name: &str) -> LineItem {
    LineItem {
        product_id: None,
        name: "Domain Registration".into(),
        unit_price: dec!(800),
        quantity: 1,
        config: ItemConfig::Domain(DomainConfig::new(name, 1)),
    }
}

pub fn webhook_body(event: &str, order_ref: &str, payment_ref: &str, amount_minor: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_ref,
                    "order_id": order_ref,
                    "amount": amount_minor,
                    "currency": "INR",
                    "status": "captured"
                }
            }
        }
    }))
    .unwrap()
}

pub fn sign_body(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET, body)
}
