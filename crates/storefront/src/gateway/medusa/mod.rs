//! Medusa store API client implementation.
//!
//! Uses `reqwest` 0.13 against the REST store API. Every cart mutation answers
//! with the full cart, which is decoded into `wire` structs and converted into
//! domain types. Transient failures are retried with exponential backoff.

mod wire;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use medusa_store_core::{
    CartId, LineItemId, OrderId, PaymentProviderId, ProductId, RegionId, ShippingOptionId,
    VariantId,
};

use crate::config::MedusaConfig;
use crate::gateway::types::{
    Cart, CartUpdate, Completion, Order, Product, ProductPage, ProductQuery, ShippingOption,
};
use crate::gateway::{CommerceGateway, GatewayError};

use wire::{
    CartEnvelope, CompletionEnvelope, DeleteEnvelope, ErrorBody, OrderEnvelope, ProductEnvelope,
    ProductsEnvelope, ShippingOptionsEnvelope,
};

/// Upper bound on how long a `Retry-After` header can make us wait.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// MedusaClient
// =============================================================================

/// Client for the Medusa store API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct MedusaClient {
    inner: Arc<MedusaClientInner>,
}

struct MedusaClientInner {
    client: reqwest::Client,
    base_url: Url,
    publishable_key: Option<SecretString>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl MedusaClient {
    /// Create a new store API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn new(config: &MedusaConfig) -> Result<Self, GatewayError> {
        if config.base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidRequest(format!(
                "base URL cannot be a base: {}",
                config.base_url
            )));
        }

        Ok(Self {
            inner: Arc::new(MedusaClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                publishable_key: config.publishable_key.clone(),
                max_retries: config.max_retries,
                retry_backoff: config.retry_backoff,
            }),
        })
    }

    /// Build an endpoint URL from path segments (each one percent-encoded).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidRequest("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Execute a request, retrying transient failures, and decode the body.
    ///
    /// Reads are retried on any transient failure. Mutations are retried only
    /// when the request never reached the backend.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let idempotent = method == Method::GET;
        let mut attempt: u32 = 0;

        loop {
            match self.send_once(&method, &url, body.as_ref()).await {
                Ok(text) => return self.decode(&text),
                Err(e)
                    if attempt < self.inner.max_retries
                        && e.is_transient()
                        && (idempotent || e.is_connect()) =>
                {
                    let delay = self.retry_delay(&e, attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        path = %url.path(),
                        "Transient gateway failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn retry_delay(&self, error: &GatewayError, attempt: u32) -> Duration {
        let backoff = self
            .inner
            .retry_backoff
            .saturating_mul(2_u32.saturating_pow(attempt));
        match error {
            GatewayError::RateLimited(secs) => {
                Duration::from_secs(*secs).min(MAX_RATE_LIMIT_WAIT).max(backoff)
            }
            _ => backoff,
        }
    }

    /// Send one request and return the body of a successful response.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
    ) -> Result<String, GatewayError> {
        let mut request = self.inner.client.request(method.clone(), url.clone());
        if let Some(key) = &self.inner.publishable_key {
            request = request.header("x-publishable-api-key", key.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(url.path().to_string()));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&response_text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| response_text.chars().take(200).collect());
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Medusa API returned non-success status"
            );
            if status == reqwest::StatusCode::BAD_REQUEST {
                return Err(GatewayError::InvalidRequest(message));
            }
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response_text)
    }

    #[allow(clippy::unused_self)]
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, GatewayError> {
        serde_json::from_str(text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse Medusa response"
            );
            GatewayError::Parse(e)
        })
    }

    async fn cart_request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> Result<Cart, GatewayError> {
        let url = self.endpoint(segments)?;
        let envelope: CartEnvelope = self.execute(method, url, body).await?;
        Ok(envelope.cart.into())
    }
}

// =============================================================================
// CommerceGateway
// =============================================================================

#[async_trait]
impl CommerceGateway for MedusaClient {
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn retrieve_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        self.cart_request(Method::GET, &["store", "carts", cart_id.as_str()], None)
            .await
    }

    #[instrument(skip(self))]
    async fn create_cart(&self, region_id: Option<&RegionId>) -> Result<Cart, GatewayError> {
        let body = region_id.map_or_else(|| json!({}), |id| json!({ "region_id": id }));
        let cart = self
            .cart_request(Method::POST, &["store", "carts"], Some(body))
            .await?;
        debug!(cart_id = %cart.id, "Created cart");
        Ok(cart)
    }

    #[instrument(skip(self, update), fields(cart_id = %cart_id))]
    async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<Cart, GatewayError> {
        let body = serde_json::to_value(update)?;
        self.cart_request(Method::POST, &["store", "carts", cart_id.as_str()], Some(body))
            .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, variant_id = %variant_id))]
    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let body = json!({ "variant_id": variant_id, "quantity": quantity });
        self.cart_request(
            Method::POST,
            &["store", "carts", cart_id.as_str(), "line-items"],
            Some(body),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, line_id = %line_id))]
    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.cart_request(
            Method::POST,
            &["store", "carts", cart_id.as_str(), "line-items", line_id.as_str()],
            Some(json!({ "quantity": quantity })),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, line_id = %line_id))]
    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
    ) -> Result<Cart, GatewayError> {
        let url = self.endpoint(&[
            "store",
            "carts",
            cart_id.as_str(),
            "line-items",
            line_id.as_str(),
        ])?;
        let envelope: DeleteEnvelope = self.execute(Method::DELETE, url, None).await?;
        Ok(envelope.parent.into())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, GatewayError> {
        let mut url = self.endpoint(&["store", "shipping-options"])?;
        url.query_pairs_mut().append_pair("cart_id", cart_id.as_str());
        let envelope: ShippingOptionsEnvelope = self.execute(Method::GET, url, None).await?;
        Ok(envelope
            .shipping_options
            .into_iter()
            .map(ShippingOption::from)
            .collect())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, option_id = %option_id))]
    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<Cart, GatewayError> {
        self.cart_request(
            Method::POST,
            &["store", "carts", cart_id.as_str(), "shipping-methods"],
            Some(json!({ "option_id": option_id })),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, provider_id = %provider_id))]
    async fn initiate_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &PaymentProviderId,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["store", "carts", cart_id.as_str(), "payment-sessions"])?;
        let _: serde_json::Value = self
            .execute(
                Method::POST,
                url,
                Some(json!({ "provider_id": provider_id })),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn complete_cart(&self, cart_id: &CartId) -> Result<Completion, GatewayError> {
        let url = self.endpoint(&["store", "carts", cart_id.as_str(), "complete"])?;
        let envelope: CompletionEnvelope = self.execute(Method::POST, url, None).await?;
        let completion = Completion::from(envelope);
        debug!(kind = ?completion.kind(), "Cart completion answered");
        Ok(completion)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, GatewayError> {
        let mut url = self.endpoint(&["store", "products"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = query.offset {
                pairs.append_pair("offset", &offset.to_string());
            }
            if let Some(handle) = &query.handle {
                pairs.append_pair("handle", handle);
            }
        }
        let envelope: ProductsEnvelope = self.execute(Method::GET, url, None).await?;
        Ok(envelope.into())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        let url = self.endpoint(&["store", "products", product_id.as_str()])?;
        let envelope: ProductEnvelope = self.execute(Method::GET, url, None).await?;
        Ok(envelope.product.into())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: &OrderId) -> Result<Order, GatewayError> {
        let url = self.endpoint(&["store", "orders", order_id.as_str()])?;
        let envelope: OrderEnvelope = self.execute(Method::GET, url, None).await?;
        Ok(envelope.order.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> MedusaClient {
        MedusaClient::new(&MedusaConfig::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let url = client("http://localhost:9000")
            .endpoint(&["store", "carts", "cart_1"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/store/carts/cart_1");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes() {
        let url = client("http://localhost:9000/api/")
            .endpoint(&["store", "carts", "cart 1/x"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/store/carts/cart%201%2Fx");
    }

    #[test]
    fn test_rejects_non_base_url() {
        let config = MedusaConfig::new(Url::parse("mailto:shop@example.com").unwrap());
        assert!(MedusaClient::new(&config).is_err());
    }

    #[test]
    fn test_retry_delay_grows_and_caps_rate_limit() {
        let mut config = MedusaConfig::new(Url::parse("http://localhost:9000").unwrap());
        config.retry_backoff = Duration::from_millis(100);
        let client = MedusaClient::new(&config).unwrap();

        let err = GatewayError::Api {
            status: 503,
            message: String::new(),
        };
        assert_eq!(client.retry_delay(&err, 0), Duration::from_millis(100));
        assert_eq!(client.retry_delay(&err, 2), Duration::from_millis(400));
        assert_eq!(
            client.retry_delay(&GatewayError::RateLimited(120), 0),
            MAX_RATE_LIMIT_WAIT
        );
    }
}
