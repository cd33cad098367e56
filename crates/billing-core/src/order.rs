//! Orders
//!
//! The fulfillment record of a purchase. An order starts `Pending` and is
//! completed once every item is provisioned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, InvoiceId, OrderId, ProductId};
use crate::model::{DomainConfig, ItemConfig, LineItem};

/// Order lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

/// One purchased item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Option<ProductId>,
    pub name: String,
    pub qty: u32,
    #[serde(default)]
    pub config: ItemConfig,
}

impl From<&LineItem> for OrderItem {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            qty: item.quantity,
            config: item.config.clone(),
        }
    }
}

/// A purchase awaiting or past fulfillment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,

    /// Invoice that paid for this order
    pub invoice_id: InvoiceId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Domain configurations that need registering
    pub fn domain_items(&self) -> Vec<DomainConfig> {
        self.items
            .iter()
            .filter_map(|item| item.config.domain().cloned())
            .collect()
    }

    pub fn has_domain_items(&self) -> bool {
        self.items.iter().any(|item| item.config.domain().is_some())
    }
}

/// Builds orders from priced lines
pub struct OrderFactory;

impl OrderFactory {
    pub fn pending(client_id: ClientId, invoice_id: InvoiceId, items: &[LineItem]) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            client_id,
            items: items.iter().map(OrderItem::from).collect(),
            status: OrderStatus::Pending,
            invoice_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_domain_items() {
        let items = vec![
            LineItem {
                product_id: None,
                name: "Hosting".into(),
                unit_price: dec!(800),
                quantity: 1,
                config: ItemConfig::default(),
            },
            LineItem {
                product_id: None,
                name: "Domain".into(),
                unit_price: dec!(999),
                quantity: 1,
                config: ItemConfig::Domain(DomainConfig::new("shop.in", 2)),
            },
        ];
        let order = OrderFactory::pending(ClientId::new(), InvoiceId::new(), &items);

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.has_domain_items());
        assert_eq!(order.domain_items(), vec![DomainConfig::new("shop.in", 2)]);
    }

    #[test]
    fn test_order_without_domains() {
        let order = OrderFactory::pending(ClientId::new(), InvoiceId::new(), &[]);
        assert!(!order.has_domain_items());
        assert!(order.domain_items().is_empty());
    }
}
