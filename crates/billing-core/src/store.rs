//! Repository traits
//!
//! Every status change goes through a conditional update (`transition`,
//! `mark_success`, `mark_failed`) that checks the current status inside the
//! store's critical section. Two writers racing on the same record observe
//! exactly one `Applied`; the other sees `Unchanged`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cart::Cart;
use crate::error::Result;
use crate::ids::{ClientId, InvoiceId, OrderId, UserId};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::memory::MemoryStore;
use crate::model::{BillingDetails, Client, Domain};
use crate::order::{Order, OrderStatus};
use crate::transaction::Transaction;

/// Result of a conditional update
#[derive(Clone, Debug, PartialEq)]
pub enum StatusChange<T> {
    /// This call performed the transition
    Applied(T),

    /// The record was already in the target state
    Unchanged(T),
}

impl<T> StatusChange<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Applied(value) | Self::Unchanged(value) => value,
        }
    }

    pub const fn applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load(&self, user_id: &UserId) -> Result<Option<Cart>>;

    /// Replace the stored cart (last writer wins)
    async fn save(&self, cart: &Cart) -> Result<()>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Client>>;

    /// Fetch the user's billing profile, creating a default one if absent
    async fn get_or_create(&self, user_id: &UserId) -> Result<Client>;

    async fn get(&self, id: &ClientId) -> Result<Option<Client>>;

    /// Copy company, address and GST number from checkout details
    async fn update_billing(&self, user_id: &UserId, details: &BillingDetails) -> Result<Client>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<()>;

    async fn get(&self, id: &InvoiceId) -> Result<Option<Invoice>>;

    /// Move `from -> to`; `Unchanged` when already `to`, `Conflict` otherwise
    async fn transition(
        &self,
        id: &InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<StatusChange<Invoice>>;

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;

    async fn find_by_invoice(&self, invoice_id: &InvoiceId) -> Result<Option<Order>>;

    /// Move `from -> to`; `Unchanged` when already `to`, `Conflict` otherwise
    async fn transition(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<StatusChange<Order>>;

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a new pending transaction; gateway order refs are unique
    async fn insert(&self, transaction: &Transaction) -> Result<()>;

    async fn find_by_gateway_order(&self, gateway_order_ref: &str) -> Result<Option<Transaction>>;

    /// Flip to success and record the payment ref, unless already successful
    async fn mark_success(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> Result<StatusChange<Transaction>>;

    /// Flip a pending transaction to failed
    async fn mark_failed(&self, gateway_order_ref: &str) -> Result<StatusChange<Transaction>>;

    /// Attach the invoice the payment settled
    async fn link_invoice(&self, gateway_order_ref: &str, invoice_id: InvoiceId) -> Result<Transaction>;

    /// Every payment attempt opened against an invoice
    async fn list_by_invoice(&self, invoice_id: &InvoiceId) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Reserve a name for an in-flight registration
    ///
    /// Returns `false` when the name is already registered or claimed.
    async fn claim(&self, name: &str) -> Result<bool>;

    /// Drop a reservation after a failed registration
    async fn release(&self, name: &str) -> Result<()>;

    /// Persist a registered domain and drop its reservation
    async fn insert(&self, domain: &Domain) -> Result<()>;

    async fn list_by_client(&self, client_id: &ClientId) -> Result<Vec<Domain>>;
}

/// The full set of repositories the services work against
#[derive(Clone)]
pub struct Repositories {
    pub carts: Arc<dyn CartRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub domains: Arc<dyn DomainRepository>,
}

impl Repositories {
    /// All repositories backed by one shared [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_store(store: Arc<MemoryStore>) -> Self {
        Self {
            carts: store.clone(),
            clients: store.clone(),
            invoices: store.clone(),
            orders: store.clone(),
            transactions: store.clone(),
            domains: store,
        }
    }
}
