//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billing_core::{
    BillingDetails, BillingError, Cart, CartItemId, CheckoutSummary, Client, Domain, Invoice, InvoiceId,
    InvoiceStatus, ItemConfig, LineItem, Order, OrderId, OrderStatus, Product, ProductId, UserId,
};
use chrono::Utc;
use billing_payments::{
    CheckoutResult, PaymentConfirmation, PaymentOrder, PaymentOutcome, SIGNATURE_HEADER, WebhookOutcome,
};

use crate::state::AppState;

/// Header carrying the caller's user reference, set by the auth proxy
pub const USER_HEADER: &str = "x-user-id";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        message: None,
        data,
    }))
}

fn ok_with<T>(message: &str, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        message: Some(message.into()),
        data,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub gateway: String,
    pub gateway_live: bool,
    pub registrar: String,
    pub registrar_live: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheckResponse {
    pub domain: String,
    pub available: bool,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_orders: usize,
    pub completed_orders: usize,
    pub pending_orders: usize,
    pub total_domains: usize,
    pub active_domains: usize,
    pub pending_payments: usize,
}

/// Everything billed to one user, newest first
#[derive(Debug, Default, Serialize)]
pub struct BillingSummary {
    pub client: Option<Client>,
    pub orders: Vec<Order>,
    pub invoices: Vec<Invoice>,
    pub domains: Vec<Domain>,
    pub stats: SummaryStats,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub outcome: WebhookOutcome,
}

// ============================================================================
// Errors and extractors
// ============================================================================

/// Error rendered as `{success: false, message, code}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let (status, code) = match &err {
            BillingError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
            BillingError::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
            BillingError::Json(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            BillingError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BillingError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            BillingError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            BillingError::Config(_) | BillingError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        if err.is_client_error() {
            tracing::debug!(error = %err, "Request rejected");
        } else {
            tracing::error!(error = %err, "Request failed");
        }

        Self::new(status, code, err.user_message())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), error = %rejection.body_text(), "Request body rejected");
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.message,
            code: self.code.into(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// JSON body whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Caller identity taken from [`USER_HEADER`]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(UserId::new(v)))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Not authorized, no user"))
    }
}

fn parse_item_id(raw: &str) -> Result<CartItemId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::from(BillingError::InvalidArgument(format!("Invalid item id {raw}: {e}"))))
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::from(BillingError::InvalidArgument(format!("Invalid order id {raw}: {e}"))))
}

// ============================================================================
// Request Types
// ============================================================================

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(alias = "productRef")]
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub config: Option<ItemConfig>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub billing_details: Option<BillingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub items: Option<Vec<LineItem>>,
    #[serde(default, alias = "invoice_id")]
    pub invoice_id: Option<InvoiceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAndCompleteRequest {
    #[serde(alias = "razorpay_order_id", alias = "orderId")]
    pub gateway_order_ref: String,
    #[serde(alias = "razorpay_payment_id", alias = "paymentId")]
    pub gateway_payment_ref: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = &state.services;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: format!("{:?}", services.config.environment).to_lowercase(),
        gateway: services.gateway.name().to_string(),
        gateway_live: state.gateway_live,
        registrar: services.registrar.name().to_string(),
        registrar_live: state.registrar_live,
    })
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    ok(state.services.catalog.products().await?)
}

pub async fn get_cart(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Cart> {
    ok(state.services.carts.get(&user).await?)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<AddToCartRequest>,
) -> ApiResult<Cart> {
    let cart = state
        .services
        .carts
        .add_item(&user, payload.product_id, payload.quantity, payload.config)
        .await?;
    ok_with("Item added to cart", cart)
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateQuantityRequest>,
) -> ApiResult<Cart> {
    let item_id = parse_item_id(&item_id)?;
    ok(state
        .services
        .carts
        .set_item_quantity(&user, item_id, payload.quantity)
        .await?)
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
) -> ApiResult<Cart> {
    let item_id = parse_item_id(&item_id)?;
    ok_with("Item removed from cart", state.services.carts.remove_item(&user, item_id).await?)
}

pub async fn clear_cart(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Cart> {
    ok_with("Cart cleared", state.services.carts.clear(&user).await?)
}

pub async fn checkout_summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<CheckoutSummary> {
    ok(state.services.checkout.summary(&user).await?)
}

/// Invoice-first checkout; the body is optional
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> ApiResult<CheckoutResult> {
    let request: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(BillingError::from)?
    };

    let result = state
        .services
        .checkout
        .checkout(&user, request.billing_details)
        .await?;
    ok_with("Order placed successfully", result)
}

/// Mint a gateway order for an invoice, the given items, or the cart
pub async fn create_payment_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> ApiResult<PaymentOrder> {
    let checkout = &state.services.checkout;
    let order = match payload.invoice_id {
        Some(invoice_id) => {
            checkout
                .create_invoice_payment(&user, invoice_id, payload.amount)
                .await?
        }
        None => {
            checkout
                .create_payment_order(&user, payload.amount, payload.items)
                .await?
        }
    };
    ok(order)
}

pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(confirmation): ApiJson<PaymentConfirmation>,
) -> ApiResult<PaymentOutcome> {
    let outcome = state.services.checkout.verify_payment(&user, &confirmation).await?;
    ok_with("Payment verified successfully", outcome)
}

pub async fn verify_and_complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<VerifyAndCompleteRequest>,
) -> ApiResult<PaymentOutcome> {
    let confirmation = PaymentConfirmation {
        gateway_order_ref: payload.gateway_order_ref,
        gateway_payment_ref: payload.gateway_payment_ref,
        signature: payload.signature,
    };
    let outcome = state
        .services
        .checkout
        .verify_and_complete(&user, &confirmation, payload.items, payload.billing_details)
        .await?;
    ok_with("Payment verified and order completed", outcome)
}

/// Razorpay webhook; acknowledged whenever the signature is valid
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = state.services.webhooks.handle(&body, signature).await.map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        match e {
            BillingError::InvalidSignature(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature")
            }
            other => ApiError::from(other),
        }
    })?;

    Ok(Json(WebhookAck {
        status: "ok",
        outcome,
    }))
}

pub async fn check_domain(
    State(state): State<AppState>,
    Query(query): Query<DomainQuery>,
) -> ApiResult<DomainCheckResponse> {
    let domain = query.domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(BillingError::InvalidArgument("Domain name is required".into()).into());
    }

    let availability = state
        .services
        .registrar
        .check_availability(&domain)
        .await
        .map_err(BillingError::from)?;
    ok(DomainCheckResponse {
        price: availability.price(),
        domain: availability.domain,
        available: availability.available,
        currency: availability.currency,
    })
}

pub async fn list_domains(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Vec<Domain>> {
    let repos = &state.services.repos;
    let domains = match repos.clients.find_by_user(&user).await? {
        Some(client) => repos.domains.list_by_client(&client.id).await?,
        None => Vec::new(),
    };
    ok(domains)
}

/// Orders of the caller, newest first
pub async fn list_orders(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Vec<Order>> {
    let repos = &state.services.repos;
    let mut orders = match repos.clients.find_by_user(&user).await? {
        Some(client) => repos.orders.list_by_client(&client.id).await?,
        None => Vec::new(),
    };
    orders.reverse();
    ok(orders)
}

/// One of the caller's orders with its invoice
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<OrderDetail> {
    let order_id = parse_order_id(&order_id)?;
    let repos = &state.services.repos;
    let not_found = || BillingError::not_found("Order", order_id);

    let client = repos.clients.find_by_user(&user).await?.ok_or_else(not_found)?;
    let order = repos
        .orders
        .get(&order_id)
        .await?
        .filter(|order| order.client_id == client.id)
        .ok_or_else(not_found)?;
    let invoice = repos.invoices.get(&order.invoice_id).await?;

    ok(OrderDetail { order, invoice })
}

/// Orders, invoices and domains of the caller with counts
pub async fn billing_summary(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<BillingSummary> {
    let repos = &state.services.repos;
    let Some(client) = repos.clients.find_by_user(&user).await? else {
        return ok(BillingSummary::default());
    };

    let mut orders = repos.orders.list_by_client(&client.id).await?;
    let mut invoices = repos.invoices.list_by_client(&client.id).await?;
    let domains = repos.domains.list_by_client(&client.id).await?;
    orders.reverse();
    invoices.reverse();

    let now = Utc::now();
    let count_orders = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();
    let stats = SummaryStats {
        total_orders: orders.len(),
        completed_orders: count_orders(OrderStatus::Completed),
        pending_orders: count_orders(OrderStatus::Pending),
        total_domains: domains.len(),
        active_domains: domains.iter().filter(|d| !d.is_expired(now)).count(),
        pending_payments: invoices.iter().filter(|i| i.status == InvoiceStatus::Unpaid).count(),
    };

    ok(BillingSummary {
        client: Some(client),
        orders,
        invoices,
        domains,
        stats,
    })
}
