//! HTTP client for the Moltin / Elastic Path commerce API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{CommerceConfig, RecoveryConfig};
use crate::store::KeyValueStore;

use super::error::{ApiErrorResponse, CommerceError};
use super::token::TokenCache;
use super::types::{
    AccessToken, Cart, CartData, CartItem, CartItemData, CartItemRequest, CustomerData,
    CustomerRequest, Envelope, FileData, Product, ProductData, RequestEnvelope,
};
use super::Storefront;

/// Commerce API client.
///
/// Cheap to clone; every request carries a bearer token obtained with the
/// client-credentials grant and cached in the key-value store.
#[derive(Clone)]
pub struct MoltinClient {
    inner: Arc<MoltinClientInner>,
}

struct MoltinClientInner {
    http: reqwest::Client,
    config: CommerceConfig,
    tokens: TokenCache,
    breaker: CircuitBreaker,
}

impl MoltinClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        config: CommerceConfig,
        recovery: RecoveryConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CommerceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.request_timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(MoltinClientInner {
                http,
                config,
                tokens: TokenCache::new(store),
                breaker: CircuitBreaker::new(recovery),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.config.api_url)
    }

    /// Bearer token, from cache or freshly issued
    pub async fn access_token(&self) -> Result<String, CommerceError> {
        if let Some(token) = self.inner.tokens.get().await {
            return Ok(token);
        }

        let form = [
            ("client_id", self.inner.config.client_id.as_str()),
            ("client_secret", self.inner.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .guarded(
                self.inner
                    .http
                    .post(self.url("/oauth/access_token"))
                    .form(&form),
            )
            .await?;
        let token: AccessToken = parse_json(response).await?;

        info!(expires_in = token.expires_in, "Issued new commerce access token");
        self.inner.tokens.put(&token).await;

        Ok(token.access_token)
    }

    /// Send a request through the circuit breaker
    async fn guarded(&self, request: RequestBuilder) -> Result<Response, CommerceError> {
        let breaker = &self.inner.breaker;
        if breaker.is_open() {
            warn!("Circuit breaker open, skipping commerce request");
            return Err(CommerceError::Unavailable);
        }

        let outcome = match request.send().await {
            Ok(response) => check_status(response).await,
            Err(e) => Err(CommerceError::from(e)),
        };

        match &outcome {
            Err(e) if e.is_backend_failure() => breaker.record_failure(),
            _ => breaker.record_success(),
        }

        outcome
    }

    /// Send an authorized request, refreshing the token once on 401
    async fn authorized<F>(&self, build: F) -> Result<Response, CommerceError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.access_token().await?;
        match self.guarded(build(&self.inner.http).bearer_auth(&token)).await {
            Err(CommerceError::Unauthorized(reason)) => {
                debug!(reason = %reason, "Access token rejected, requesting a new one");
                self.inner.tokens.invalidate().await;
                let token = self.access_token().await?;
                self.guarded(build(&self.inner.http).bearer_auth(&token))
                    .await
            }
            outcome => outcome,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CommerceError> {
        let url = self.url(path);
        let response = self.authorized(|http| http.get(&url)).await?;
        parse_json(response).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, CommerceError>
    where
        T: DeserializeOwned,
        B: serde::Serialize + Sync,
    {
        let url = self.url(path);
        let response = self.authorized(|http| http.post(&url).json(body)).await?;
        parse_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), CommerceError> {
        let url = self.url(path);
        self.authorized(|http| http.delete(&url)).await?;
        Ok(())
    }

    async fn cart_items(&self, cart_id: &str) -> Result<Vec<CartItem>, CommerceError> {
        let envelope: Envelope<Vec<CartItemData>> =
            self.get(&format!("/v2/carts/{cart_id}/items")).await?;
        Ok(envelope.data.into_iter().map(CartItem::from).collect())
    }

    async fn cart_total(&self, cart_id: &str) -> Result<String, CommerceError> {
        let envelope: Envelope<CartData> = self.get(&format!("/v2/carts/{cart_id}")).await?;
        Ok(envelope.data.meta.display_price.with_tax.formatted)
    }
}

#[async_trait]
impl Storefront for MoltinClient {
    async fn products(&self) -> Result<Vec<Product>, CommerceError> {
        let envelope: Envelope<Vec<ProductData>> = self.get("/v2/products").await?;
        Ok(envelope.data.into_iter().map(Product::from).collect())
    }

    async fn product(&self, product_id: &str) -> Result<Product, CommerceError> {
        let envelope: Envelope<ProductData> =
            self.get(&format!("/v2/products/{product_id}")).await?;
        Ok(Product::from(envelope.data))
    }

    async fn image_url(&self, file_id: &str) -> Result<String, CommerceError> {
        let envelope: Envelope<FileData> = self.get(&format!("/v2/files/{file_id}")).await?;
        Ok(envelope.data.link.href)
    }

    async fn add_to_cart(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), CommerceError> {
        let body = RequestEnvelope {
            data: CartItemRequest {
                id: product_id,
                kind: "cart_item",
                quantity,
            },
        };
        let _: serde_json::Value = self
            .post(&format!("/v2/carts/{cart_id}/items"), &body)
            .await?;
        debug!(cart_id, product_id, quantity, "Added item to cart");
        Ok(())
    }

    async fn remove_from_cart(&self, cart_id: &str, item_id: &str) -> Result<(), CommerceError> {
        self.delete(&format!("/v2/carts/{cart_id}/items/{item_id}"))
            .await?;
        debug!(cart_id, item_id, "Removed item from cart");
        Ok(())
    }

    async fn cart(&self, cart_id: &str) -> Result<Cart, CommerceError> {
        let items = self.cart_items(cart_id).await?;
        let total = self.cart_total(cart_id).await?;
        Ok(Cart { items, total })
    }

    async fn create_customer(&self, name: &str, email: &str) -> Result<String, CommerceError> {
        let body = RequestEnvelope {
            data: CustomerRequest {
                kind: "customer",
                name,
                email,
            },
        };
        let envelope: Envelope<CustomerData> = self.post("/v2/customers", &body).await?;
        info!(customer_id = %envelope.data.id, "Created customer record");
        Ok(envelope.data.id)
    }
}

/// Turn a non-success response into a typed error
async fn check_status(response: Response) -> Result<Response, CommerceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .ok()
        .and_then(|parsed| parsed.message())
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED => CommerceError::Unauthorized(message),
        StatusCode::NOT_FOUND => CommerceError::NotFound(message),
        _ => CommerceError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CommerceError> {
    response
        .json()
        .await
        .map_err(|e| CommerceError::Parse(format!("Failed to parse response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce::TOKEN_KEY;
    use crate::store::MemoryStore;

    fn client(api_url: &str, store: Arc<dyn KeyValueStore>, threshold: u32) -> MoltinClient {
        let config = CommerceConfig {
            api_url: api_url.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        let recovery = RecoveryConfig {
            request_timeout_secs: 2,
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: 60,
        };
        MoltinClient::new(config, recovery, store).unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = client("https://api.example.test", Arc::new(MemoryStore::new()), 5);
        assert_eq!(
            client.url("/v2/carts/42/items"),
            "https://api.example.test/v2/carts/42/items"
        );
    }

    #[tokio::test]
    async fn test_cached_token_skips_request() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "cached-token").await.unwrap();

        // Nothing listens here; a network call would fail
        let client = client("http://127.0.0.1:9", store, 5);
        assert_eq!(client.access_token().await.unwrap(), "cached-token");
    }

    #[tokio::test]
    async fn test_breaker_opens_after_transport_failures() {
        let client = client("http://127.0.0.1:9", Arc::new(MemoryStore::new()), 1);

        let first = client.products().await.unwrap_err();
        assert!(first.is_backend_failure());

        let second = client.products().await.unwrap_err();
        assert!(matches!(second, CommerceError::Unavailable));
    }
}
