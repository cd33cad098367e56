//! # billing-fulfillment
//!
//! Post-payment provisioning. Today that means registering domains with an
//! external registrar once an order has been paid.
//!
//! ## Flow
//!
//! ```text
//! settlement ──dispatch──▶ FulfillmentDispatcher ──▶ FulfillmentWorker
//!                           (mpsc, detached)            │
//!                                                       ├─ claim name
//!                                                       ├─ DomainRegistrar::purchase
//!                                                       ├─ persist Domain
//!                                                       └─ complete Order
//! ```
//!
//! Registrar failures never propagate to the caller. They are logged with
//! the order, client and domain, and the order stays pending for an operator.

pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod registrar;
pub mod worker;

pub use config::{ContactDefaults, RegistrarConfig};
pub use contacts::{Contact, ContactSet, MailingAddress};
pub use dispatch::FulfillmentDispatcher;
pub use error::RegistrarError;
pub use registrar::{Availability, DomainRegistrar, GoDaddyRegistrar, MockRegistrar, PurchaseRequest};
pub use worker::{FulfillmentJob, FulfillmentReport, FulfillmentWorker, ItemOutcome};
