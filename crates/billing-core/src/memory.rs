//! In-memory store (for development and tests)
//!
//! Each table sits behind its own `tokio::sync::RwLock`. Conditional updates
//! read and write under one write guard, which gives them the same
//! compare-and-set behaviour a database row update with a status predicate
//! would have.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::cart::Cart;
use crate::error::{BillingError, Result};
use crate::ids::{ClientId, DomainId, InvoiceId, OrderId, UserId};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::model::{BillingDetails, Client, Domain};
use crate::order::{Order, OrderStatus};
use crate::store::{
    CartRepository, ClientRepository, DomainRepository, InvoiceRepository, OrderRepository,
    StatusChange, TransactionRepository,
};
use crate::transaction::{Transaction, TransactionStatus};

#[derive(Default)]
struct DomainTable {
    by_id: HashMap<DomainId, Domain>,
    by_name: HashMap<String, DomainId>,
    claims: HashSet<String>,
}

/// Implements every repository trait over process memory
#[derive(Default)]
pub struct MemoryStore {
    carts: RwLock<HashMap<UserId, Cart>>,
    clients: RwLock<HashMap<ClientId, Client>>,
    invoices: RwLock<HashMap<InvoiceId, Invoice>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    transactions: RwLock<HashMap<String, Transaction>>,
    domains: RwLock<DomainTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user_id.clone(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Client>> {
        let clients = self.clients.read().await;
        Ok(clients.values().find(|c| &c.user_id == user_id).cloned())
    }

    async fn get_or_create(&self, user_id: &UserId) -> Result<Client> {
        let mut clients = self.clients.write().await;

        if let Some(client) = clients.values().find(|c| &c.user_id == user_id) {
            return Ok(client.clone());
        }

        let client = Client::new(user_id.clone());
        tracing::info!(user_id = %user_id, client_id = %client.id, "Created client profile");
        clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get(&self, id: &ClientId) -> Result<Option<Client>> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn update_billing(&self, user_id: &UserId, details: &BillingDetails) -> Result<Client> {
        let mut clients = self.clients.write().await;

        let client = clients
            .values_mut()
            .find(|c| &c.user_id == user_id)
            .ok_or_else(|| BillingError::not_found("Client for user", user_id))?;

        if details.company.is_some() {
            client.company.clone_from(&details.company);
        }
        if details.address.is_some() {
            client.address.clone_from(&details.address);
        }
        if details.gst_number.is_some() {
            client.gst_number.clone_from(&details.gst_number);
        }

        Ok(client.clone())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn insert(&self, invoice: &Invoice) -> Result<()> {
        self.invoices.write().await.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<StatusChange<Invoice>> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .get_mut(id)
            .ok_or_else(|| BillingError::not_found("Invoice", id))?;

        if invoice.status == to {
            return Ok(StatusChange::Unchanged(invoice.clone()));
        }
        if invoice.status != from {
            return Err(BillingError::Conflict(format!(
                "Invoice {id} is {:?}, expected {from:?}",
                invoice.status
            )));
        }

        invoice.status = to;
        invoice.updated_at = Utc::now();
        Ok(StatusChange::Applied(invoice.clone()))
    }

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut list: Vec<Invoice> = invoices
            .values()
            .filter(|i| &i.client_id == client_id)
            .cloned()
            .collect();
        list.sort_by_key(|i| i.created_at);
        Ok(list)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_invoice(&self, invoice_id: &InvoiceId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.values().find(|o| &o.invoice_id == invoice_id).cloned())
    }

    async fn transition(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<StatusChange<Order>> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| BillingError::not_found("Order", id))?;

        if order.status == to {
            return Ok(StatusChange::Unchanged(order.clone()));
        }
        if order.status != from {
            return Err(BillingError::Conflict(format!(
                "Order {id} is {:?}, expected {from:?}",
                order.status
            )));
        }

        order.status = to;
        order.updated_at = Utc::now();
        Ok(StatusChange::Applied(order.clone()))
    }

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut list: Vec<Order> = orders
            .values()
            .filter(|o| &o.client_id == client_id)
            .cloned()
            .collect();
        list.sort_by_key(|o| o.created_at);
        Ok(list)
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert(&self, transaction: &Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;

        if transactions.contains_key(&transaction.gateway_order_ref) {
            return Err(BillingError::Conflict(format!(
                "Transaction for gateway order {} already exists",
                transaction.gateway_order_ref
            )));
        }

        transactions.insert(transaction.gateway_order_ref.clone(), transaction.clone());
        Ok(())
    }

    async fn find_by_gateway_order(&self, gateway_order_ref: &str) -> Result<Option<Transaction>> {
        Ok(self.transactions.read().await.get(gateway_order_ref).cloned())
    }

    async fn mark_success(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> Result<StatusChange<Transaction>> {
        let mut transactions = self.transactions.write().await;
        let txn = transactions
            .get_mut(gateway_order_ref)
            .ok_or_else(|| BillingError::not_found("Transaction for gateway order", gateway_order_ref))?;

        if txn.status == TransactionStatus::Success {
            return Ok(StatusChange::Unchanged(txn.clone()));
        }

        txn.status = TransactionStatus::Success;
        txn.gateway_payment_ref = Some(gateway_payment_ref.to_string());
        txn.updated_at = Utc::now();
        Ok(StatusChange::Applied(txn.clone()))
    }

    async fn mark_failed(&self, gateway_order_ref: &str) -> Result<StatusChange<Transaction>> {
        let mut transactions = self.transactions.write().await;
        let txn = transactions
            .get_mut(gateway_order_ref)
            .ok_or_else(|| BillingError::not_found("Transaction for gateway order", gateway_order_ref))?;

        if txn.status != TransactionStatus::Pending {
            return Ok(StatusChange::Unchanged(txn.clone()));
        }

        txn.status = TransactionStatus::Failed;
        txn.updated_at = Utc::now();
        Ok(StatusChange::Applied(txn.clone()))
    }

    async fn link_invoice(&self, gateway_order_ref: &str, invoice_id: InvoiceId) -> Result<Transaction> {
        let mut transactions = self.transactions.write().await;
        let txn = transactions
            .get_mut(gateway_order_ref)
            .ok_or_else(|| BillingError::not_found("Transaction for gateway order", gateway_order_ref))?;

        txn.invoice_id = Some(invoice_id);
        txn.updated_at = Utc::now();
        Ok(txn.clone())
    }

    async fn list_by_invoice(&self, invoice_id: &InvoiceId) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut list: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.invoice_id.as_ref() == Some(invoice_id))
            .cloned()
            .collect();
        list.sort_by_key(|t| t.created_at);
        Ok(list)
    }
}

#[async_trait]
impl DomainRepository for MemoryStore {
    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        Ok(self.domains.read().await.by_name.contains_key(&name.to_lowercase()))
    }

    async fn claim(&self, name: &str) -> Result<bool> {
        let name = name.to_lowercase();
        let mut domains = self.domains.write().await;

        if domains.by_name.contains_key(&name) {
            return Ok(false);
        }
        Ok(domains.claims.insert(name))
    }

    async fn release(&self, name: &str) -> Result<()> {
        self.domains.write().await.claims.remove(&name.to_lowercase());
        Ok(())
    }

    async fn insert(&self, domain: &Domain) -> Result<()> {
        let name = domain.name.to_lowercase();
        let mut domains = self.domains.write().await;

        if domains.by_name.contains_key(&name) {
            return Err(BillingError::Conflict(format!("Domain {name} is already registered")));
        }

        domains.claims.remove(&name);
        domains.by_name.insert(name, domain.id);
        domains.by_id.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Domain>> {
        let domains = self.domains.read().await;
        let mut list: Vec<Domain> = domains
            .by_id
            .values()
            .filter(|d| &d.client_id == client_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }
}
