//! # billing-core
//!
//! Domain model and persistence contracts for the checkout-to-fulfillment
//! billing pipeline.
//!
//! ## Record lifecycle
//!
//! ```text
//! ┌────────┐  checkout   ┌─────────┐ 1:1 ┌────────┐  fulfillment  ┌────────┐
//! │  Cart  │────────────▶│ Invoice │◀────│ Order  │──────────────▶│ Domain │
//! └────────┘             └─────────┘     └────────┘               └────────┘
//!                             ▲
//!                             │ linked on settlement
//!                      ┌─────────────┐
//!                      │ Transaction │  keyed by gateway order ref
//!                      └─────────────┘
//! ```
//!
//! Everything that mutates a record goes through the repository traits in
//! [`store`], whose status transitions are conditional (`from → to`) so that
//! two racing writers converge instead of overwriting each other.

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod memory;
pub mod model;
pub mod order;
pub mod store;
pub mod transaction;

pub use cart::{Cart, CartItem, CartStore, CheckoutSummary};
pub use catalog::{Catalog, MemoryCatalog};
pub use config::{BillingConfig, Environment};
pub use error::{BillingError, Result};
pub use ids::{CartItemId, ClientId, DomainId, InvoiceId, OrderId, ProductId, TransactionId, UserId};
pub use invoice::{Invoice, InvoiceFactory, InvoiceLine, InvoiceStatus};
pub use memory::MemoryStore;
pub use model::{
    BillingDetails, Client, Domain, DomainConfig, DomainStatus, GenericConfig, ItemConfig,
    LineItem, Pricing, Product, ProductType,
};
pub use order::{Order, OrderFactory, OrderItem, OrderStatus};
pub use store::{
    CartRepository, ClientRepository, DomainRepository, InvoiceRepository, OrderRepository,
    Repositories, StatusChange, TransactionRepository,
};
pub use transaction::{CheckoutProtocol, Transaction, TransactionMetadata, TransactionStatus};
