//! Registrar contact blocks
//!
//! Registrars want four contact roles (registrant, admin, tech, billing).
//! All four are built from the same billing details, with placeholders for
//! anything the payer did not supply.

use billing_core::BillingDetails;
use serde::{Deserialize, Serialize};

use crate::config::ContactDefaults;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingAddress {
    pub address1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name_first: String,
    pub name_last: String,
    pub email: String,
    pub phone: String,
    pub address_mailing: MailingAddress,
}

/// The four contact roles of a registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSet {
    pub contact_registrant: Contact,
    pub contact_admin: Contact,
    pub contact_tech: Contact,
    pub contact_billing: Contact,
}

impl ContactSet {
    /// Same contact in every role
    pub fn uniform(contact: Contact) -> Self {
        Self {
            contact_registrant: contact.clone(),
            contact_admin: contact.clone(),
            contact_tech: contact.clone(),
            contact_billing: contact,
        }
    }
}

/// Split a free-text name into first and last parts
///
/// A single word is used for both parts; an empty name yields `None`.
pub fn split_name(name: &str) -> Option<(String, String)> {
    let mut parts = name.split_whitespace();
    let first = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        first.clone()
    } else {
        rest.join(" ")
    };
    Some((first, last))
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Build the registrar contacts for a payer
pub fn build_contacts(details: &BillingDetails, defaults: &ContactDefaults) -> ContactSet {
    let (name_first, name_last) = details
        .name
        .as_deref()
        .and_then(split_name)
        .or_else(|| split_name(&defaults.name))
        .unwrap_or_else(|| (defaults.name.clone(), defaults.name.clone()));

    let contact = Contact {
        name_first,
        name_last,
        email: non_blank(details.email.as_ref()).unwrap_or_else(|| defaults.email.clone()),
        phone: non_blank(details.phone.as_ref()).unwrap_or_else(|| defaults.phone.clone()),
        address_mailing: MailingAddress {
            address1: non_blank(details.address.as_ref()).unwrap_or_else(|| defaults.address1.clone()),
            city: defaults.city.clone(),
            state: defaults.state.clone(),
            postal_code: defaults.postal_code.clone(),
            country: defaults.country.clone(),
        },
    };

    ContactSet::uniform(contact)
}
