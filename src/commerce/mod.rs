//! Commerce backend access.
//!
//! The catalog, carts and customer records live on a Moltin / Elastic Path
//! style JSON:API backend. The bot talks to it only through [`Storefront`],
//! which [`MoltinClient`] implements over HTTP.
//!
//! # API Reference
//!
//! - Authentication: `POST /oauth/access_token` (client credentials)
//! - Catalog: `GET /v2/products`, `GET /v2/products/{id}`, `GET /v2/files/{id}`
//! - Carts: `/v2/carts/{cart_id}` and `/v2/carts/{cart_id}/items`
//! - Customers: `POST /v2/customers`

mod client;
mod error;
mod token;
mod types;

pub use client::MoltinClient;
pub use error::{ApiErrorResponse, CommerceError};
pub use token::{cache_ttl, TokenCache, TOKEN_KEY};
pub use types::{AccessToken, Cart, CartItem, Product};

use async_trait::async_trait;

/// Operations the conversation needs from the commerce backend.
///
/// Carts are keyed by the Telegram chat id rendered as a string.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Every product in the catalog
    async fn products(&self) -> Result<Vec<Product>, CommerceError>;

    /// A single product
    async fn product(&self, product_id: &str) -> Result<Product, CommerceError>;

    /// Public URL of an uploaded file, used for product photos
    async fn image_url(&self, file_id: &str) -> Result<String, CommerceError>;

    /// Add `quantity` kg of a product to the cart
    async fn add_to_cart(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<(), CommerceError>;

    /// Remove a cart line by its cart item id
    async fn remove_from_cart(&self, cart_id: &str, item_id: &str) -> Result<(), CommerceError>;

    /// Cart lines together with the formatted total
    async fn cart(&self, cart_id: &str) -> Result<Cart, CommerceError>;

    /// Create a customer record, returning its id
    async fn create_customer(&self, name: &str, email: &str) -> Result<String, CommerceError>;
}
