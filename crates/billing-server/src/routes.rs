//! Router

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    add_to_cart, billing_summary, check_domain, checkout, checkout_summary, clear_cart, create_payment_order,
    get_cart, get_order, health_check, list_domains, list_orders, list_products, razorpay_webhook,
    remove_cart_item, update_cart_item, verify_and_complete, verify_payment,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & catalog
        .route("/health", get(health_check))
        .route("/products", get(list_products))
        // Cart
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/items/{item_id}", put(update_cart_item).delete(remove_cart_item))
        // Checkout & payments
        .route("/checkout", post(checkout))
        .route("/checkout/summary", get(checkout_summary))
        .route("/payments/create-order", post(create_payment_order))
        .route("/payments/verify-payment", post(verify_payment))
        .route("/payments/verify-and-complete", post(verify_and_complete))
        .route("/webhooks/razorpay", post(razorpay_webhook))
        // Records
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}", get(get_order))
        .route("/summary", get(billing_summary))
        // Domains
        .route("/domains", get(list_domains))
        .route("/domains/check", get(check_domain))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use billing_payments::signature;
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const MOCK_SECRET: &str = "mock_key_secret";

    async fn app() -> Router {
        let (state, _processor) = AppState::from_lookup(|key| {
            (key == "RAZORPAY_WEBHOOK_SECRET").then(|| "whsec_test".to_string())
        })
        .await
        .unwrap();
        router(state)
    }

    async fn send(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn decimal(value: &Value) -> Decimal {
        serde_json::from_value(value.clone()).unwrap()
    }

    async fn domain_product(app: &Router) -> String {
        let (_, products) = send(app, Method::GET, "/products", None, None).await;
        products["data"][0]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["gatewayLive"], false);
        assert_eq!(body["registrar"], "mock");
    }

    #[tokio::test]
    async fn test_requires_user() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/cart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_cart_lifecycle() {
        let app = app().await;
        let product = domain_product(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            Some("u1"),
            Some(json!({ "productId": product, "quantity": 1, "config": { "domain": "site.com" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["data"]["subtotal"]), dec!(999));
        assert_eq!(decimal(&body["data"]["total"]), dec!(1178.82));

        let item_id = body["data"]["items"][0]["id"].as_str().unwrap().to_string();
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/cart/items/{item_id}"),
            Some("u1"),
            Some(json!({ "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["data"]["subtotal"]), dec!(1998));

        let (status, _) = send(&app, Method::DELETE, &format!("/cart/items/{item_id}"), Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::GET, "/checkout/summary", Some("u1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cart is empty");
    }

    #[tokio::test]
    async fn test_domain_product_requires_domain() {
        let app = app().await;
        let product = domain_product(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/cart/add",
            Some("u1"),
            Some(json!({ "productId": product })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_payment_first_over_http() {
        let app = app().await;
        let product = domain_product(&app).await;
        send(
            &app,
            Method::POST,
            "/cart/add",
            Some("u1"),
            Some(json!({ "productId": product, "config": { "domainName": "http.dev" } })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/payments/create-order",
            Some("u1"),
            Some(json!({ "amount": "1178.82" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amount"], 117_882);
        let order_ref = body["data"]["id"].as_str().unwrap().to_string();

        let signature = signature::sign(
            MOCK_SECRET,
            signature::payment_message(&order_ref, "pay_http").as_bytes(),
        );
        let confirmation = json!({
            "razorpay_order_id": order_ref,
            "razorpay_payment_id": "pay_http",
            "razorpay_signature": signature,
        });

        let (status, body) = send(
            &app,
            Method::POST,
            "/payments/verify-and-complete",
            Some("u1"),
            Some(confirmation.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["invoice"]["status"], "paid");
        assert_eq!(body["data"]["replayed"], false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/payments/verify-and-complete",
            Some("u1"),
            Some(confirmation),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["replayed"], true);

        let (_, cart) = send(&app, Method::GET, "/cart", Some("u1"), None).await;
        assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_forged_verification_rejected() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/payments/verify-payment",
            Some("u1"),
            Some(json!({
                "razorpay_order_id": "order_x",
                "razorpay_payment_id": "pay_x",
                "razorpay_signature": "deadbeef",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_SIGNATURE");
    }

    #[tokio::test]
    async fn test_webhook_signature_and_ack() {
        let app = app().await;
        let payload = json!({ "event": "payment.captured", "payload": { "payment": { "entity": {
            "id": "pay_1", "order_id": "order_missing", "amount": 100
        } } } })
        .to_string();

        let request = |sig: &str| {
            Request::builder()
                .method(Method::POST)
                .uri("/webhooks/razorpay")
                .header("content-type", "application/json")
                .header("x-razorpay-signature", sig)
                .body(Body::from(payload.clone()))
                .unwrap()
        };

        let response = app.clone().oneshot(request("bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let valid = signature::sign("whsec_test", payload.as_bytes());
        let response = app.clone().oneshot(request(&valid)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["outcome"]["result"], "unmatched");
    }

    #[tokio::test]
    async fn test_domain_endpoints() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/domains/check?domain=Free.COM", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["domain"], "free.com");
        assert_eq!(body["data"]["available"], true);
        assert_eq!(decimal(&body["data"]["price"]), dec!(11.99));

        let (status, body) = send(&app, Method::GET, "/domains", Some("nobody"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_bad_item_id() {
        let app = app().await;
        let (status, body) = send(&app, Method::DELETE, "/cart/items/not-a-uuid", Some("u1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_bad_requests() {
        let app = app().await;
        let product = domain_product(&app).await;

        for body in [json!({ "productId": "not-a-uuid" }), json!({})] {
            let (status, body) = send(&app, Method::POST, "/cart/add", Some("u1"), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "INVALID_ARGUMENT");
            assert_eq!(body["success"], false);
        }

        let (_, cart) = send(
            &app,
            Method::POST,
            "/cart/add",
            Some("u1"),
            Some(json!({ "productId": product, "config": { "domain": "neg.com" } })),
        )
        .await;
        let item_id = cart["data"]["items"][0]["id"].as_str().unwrap().to_string();
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/cart/items/{item_id}"),
            Some("u1"),
            Some(json!({ "quantity": -1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/cart/add")
            .header("x-user-id", "u1")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_orders_and_summary() {
        let app = app().await;
        let product = domain_product(&app).await;

        let (status, body) = send(&app, Method::GET, "/summary", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stats"]["totalOrders"], 0);

        send(
            &app,
            Method::POST,
            "/cart/add",
            Some("u1"),
            Some(json!({ "productId": product, "config": { "domain": "listed.com" } })),
        )
        .await;
        let (status, placed) = send(&app, Method::POST, "/checkout", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let order_id = placed["data"]["order"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, "/orders", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["status"], "pending");

        let (status, body) = send(&app, Method::GET, &format!("/orders/{order_id}"), Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["order"]["id"], order_id.as_str());
        assert_eq!(body["data"]["invoice"]["status"], "unpaid");

        // another user cannot see it
        let (status, _) = send(&app, Method::GET, &format!("/orders/{order_id}"), Some("u2"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::GET, "/orders/not-a-uuid", Some("u1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, Method::GET, "/summary", Some("u1"), None).await;
        let stats = &body["data"]["stats"];
        assert_eq!(stats["totalOrders"], 1);
        assert_eq!(stats["pendingOrders"], 1);
        assert_eq!(stats["pendingPayments"], 1);
        assert_eq!(stats["activeDomains"], 0);
        assert_eq!(body["data"]["invoices"].as_array().unwrap().len(), 1);
    }
}
