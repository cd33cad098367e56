//! Cart Store
//!
//! Per-user mutable collection of line items. Totals are derived state:
//! every mutation recomputes subtotal, tax and total from the items before
//! the cart is written back, so a stored total can never drift from its
//! lines.
//!
//! Concurrent mutations of the same user's cart are read-modify-write with
//! last-writer-wins semantics; there is no cross-request lock.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{BillingError, Result};
use crate::ids::{CartItemId, ProductId, UserId};
use crate::model::{ItemConfig, LineItem, MAX_LINE_QUANTITY, checked_sum, line_amount};
use crate::store::CartRepository;

/// A product snapshot inside a cart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,

    /// Product name at add-time
    pub name: String,

    /// Price at add-time
    pub unit_price: Decimal,

    /// Always at least 1
    pub quantity: u32,

    #[serde(default)]
    pub config: ItemConfig,
}

impl CartItem {
    pub fn line_total(&self) -> Result<Decimal> {
        line_amount(self.unit_price, self.quantity)
    }
}

impl From<&CartItem> for LineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: Some(item.product_id),
            name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            config: item.config.clone(),
        }
    }
}

/// A user's shopping cart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Derive subtotal, tax and total from the items alone
    pub fn recompute(&mut self, tax_rate: Decimal) -> Result<()> {
        let subtotal = self
            .items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| checked_sum(acc, item.line_total()?))?;
        let tax = tax_for(subtotal, tax_rate);

        self.total = checked_sum(subtotal, tax)?;
        self.subtotal = subtotal;
        self.tax = tax;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.iter().map(LineItem::from).collect()
    }

    fn item_mut(&mut self, item_id: CartItemId) -> Result<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| BillingError::not_found("Cart item", item_id))
    }
}

/// Tax on `amount`, rounded to paise
pub fn tax_for(amount: Decimal, tax_rate: Decimal) -> Decimal {
    (amount * tax_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn check_quantity(quantity: u32) -> Result<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(BillingError::InvalidArgument(format!(
            "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Totals preview shown before checkout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub item_count: usize,
}

impl From<Cart> for CheckoutSummary {
    fn from(cart: Cart) -> Self {
        Self {
            item_count: cart.items.len(),
            items: cart.items,
            subtotal: cart.subtotal,
            tax: cart.tax,
            total: cart.total,
        }
    }
}

/// Cart operations on top of a [`CartRepository`]
pub struct CartStore {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn Catalog>,
    tax_rate: Decimal,
}

impl CartStore {
    pub fn new(carts: Arc<dyn CartRepository>, catalog: Arc<dyn Catalog>, tax_rate: Decimal) -> Self {
        Self {
            carts,
            catalog,
            tax_rate,
        }
    }

    pub const fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Fetch the user's cart, creating an empty one on first access
    pub async fn get(&self, user_id: &UserId) -> Result<Cart> {
        if let Some(cart) = self.carts.load(user_id).await? {
            return Ok(cart);
        }

        tracing::info!(user_id = %user_id, "Created new cart");
        self.persist(Cart::new(user_id.clone())).await
    }

    /// Add a product, merging with an existing line for the same product
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        quantity: u32,
        config: Option<ItemConfig>,
    ) -> Result<Cart> {
        check_quantity(quantity)?;

        let product = self
            .catalog
            .product(&product_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Product", product_id))?;

        let config = config
            .map(|c| c.validated_for(product.product_type))
            .transpose()?;

        let mut cart = self.get(user_id).await?;

        if let Some(existing) = cart.items.iter_mut().find(|item| item.product_id == product_id) {
            let merged = existing.quantity.saturating_add(quantity);
            check_quantity(merged)?;
            existing.quantity = merged;
            if let Some(config) = config {
                existing.config = config;
            }
            tracing::info!(user_id = %user_id, product_id = %product_id, quantity = existing.quantity, "Updated cart item quantity");
        } else {
            let config = match config {
                Some(config) => config,
                None => ItemConfig::default().validated_for(product.product_type)?,
            };
            cart.items.push(CartItem {
                id: CartItemId::new(),
                product_id,
                name: product.name.clone(),
                unit_price: product.unit_price(),
                quantity,
                config,
            });
            tracing::info!(user_id = %user_id, product = %product.name, "Added item to cart");
        }

        self.persist(cart).await
    }

    /// Replace the quantity of one line
    pub async fn set_item_quantity(
        &self,
        user_id: &UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart> {
        check_quantity(quantity)?;

        let mut cart = self.existing(user_id).await?;
        cart.item_mut(item_id)?.quantity = quantity;

        tracing::info!(user_id = %user_id, item_id = %item_id, quantity, "Set cart item quantity");
        self.persist(cart).await
    }

    /// Drop one line
    pub async fn remove_item(&self, user_id: &UserId, item_id: CartItemId) -> Result<Cart> {
        let mut cart = self.existing(user_id).await?;

        let before = cart.items.len();
        cart.items.retain(|item| item.id != item_id);
        if cart.items.len() == before {
            return Err(BillingError::not_found("Cart item", item_id));
        }

        tracing::info!(user_id = %user_id, item_id = %item_id, "Removed cart item");
        self.persist(cart).await
    }

    /// Empty the cart
    pub async fn clear(&self, user_id: &UserId) -> Result<Cart> {
        let mut cart = self.get(user_id).await?;
        let cleared = cart.items.len();
        cart.items.clear();

        tracing::info!(user_id = %user_id, cleared, "Cleared cart");
        self.persist(cart).await
    }

    /// Totals preview; an empty cart cannot be checked out
    pub async fn summary(&self, user_id: &UserId) -> Result<CheckoutSummary> {
        let cart = self.get(user_id).await?;
        if cart.is_empty() {
            return Err(BillingError::InvalidArgument("Cart is empty".into()));
        }
        Ok(cart.into())
    }

    async fn existing(&self, user_id: &UserId) -> Result<Cart> {
        self.carts
            .load(user_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Cart for user", user_id))
    }

    async fn persist(&self, mut cart: Cart) -> Result<Cart> {
        cart.recompute(self.tax_rate)?;
        self.carts.save(&cart).await?;
        Ok(cart)
    }
}
