//! Catalog, cart and credential types.
//!
//! The `*Data` structs mirror the JSON:API payloads of the commerce backend;
//! the bot only works with the flattened domain types built from them.

use serde::{Deserialize, Serialize};

/// `{"data": ...}` envelope used by every endpoint
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// OAuth client-credentials grant response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormattedPrice {
    #[serde(default)]
    pub formatted: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPrices {
    #[serde(default)]
    pub with_tax: FormattedPrice,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductMeta {
    #[serde(default)]
    pub display_price: ProductPrices,
}

#[derive(Debug, Default, Deserialize)]
pub struct Weight {
    pub kg: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    pub data: Option<RelationshipRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductRelationships {
    pub main_image: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: ProductMeta,
    #[serde(default)]
    pub weight: Weight,
    #[serde(default)]
    pub relationships: ProductRelationships,
}

/// A catalog product
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price per kg, already formatted with currency
    pub price: String,
    pub weight_kg: Option<f64>,
    /// File id of the main image
    pub image_id: Option<String>,
}

impl From<ProductData> for Product {
    fn from(data: ProductData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            description: data.description,
            price: data.meta.display_price.with_tax.formatted,
            weight_kg: data.weight.kg,
            image_id: data
                .relationships
                .main_image
                .and_then(|image| image.data)
                .map(|image| image.id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FileLink {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct FileData {
    pub link: FileLink,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartItemPrices {
    #[serde(default)]
    pub unit: FormattedPrice,
    #[serde(default)]
    pub value: FormattedPrice,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartItemDisplayPrice {
    #[serde(default)]
    pub with_tax: CartItemPrices,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartItemMeta {
    #[serde(default)]
    pub display_price: CartItemDisplayPrice,
}

#[derive(Debug, Deserialize)]
pub struct CartItemData {
    pub id: String,
    #[serde(default)]
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    #[serde(default)]
    pub meta: CartItemMeta,
}

/// One line of a cart
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    /// Cart item id, used to remove the line
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub description: String,
    /// Quantity in kg
    pub quantity: u32,
    pub unit_price: String,
    pub value: String,
}

impl From<CartItemData> for CartItem {
    fn from(data: CartItemData) -> Self {
        Self {
            id: data.id,
            product_id: data.product_id,
            name: data.name,
            description: data.description,
            quantity: data.quantity,
            unit_price: data.meta.display_price.with_tax.unit.formatted,
            value: data.meta.display_price.with_tax.value.formatted,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CartMeta {
    #[serde(default)]
    pub display_price: ProductPrices,
}

#[derive(Debug, Deserialize)]
pub struct CartData {
    #[serde(default)]
    pub meta: CartMeta,
}

/// Cart contents together with the formatted total
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total: String,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct CartItemRequest<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CustomerRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'a str,
    pub email: &'a str,
}

/// `{"data": ...}` request envelope
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct CustomerData {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_payload() {
        let json = r#"{
            "data": {
                "id": "p-1",
                "type": "product",
                "name": "Salmon",
                "description": "Fresh atlantic salmon",
                "meta": {"display_price": {"with_tax": {"amount": 1500, "currency": "USD", "formatted": "$15.00"}}},
                "weight": {"g": 1000, "kg": 1.0, "lb": 2.2},
                "relationships": {"main_image": {"data": {"type": "main_image", "id": "file-9"}}}
            }
        }"#;

        let envelope: Envelope<ProductData> = serde_json::from_str(json).unwrap();
        let product = Product::from(envelope.data);

        assert_eq!(product.id, "p-1");
        assert_eq!(product.price, "$15.00");
        assert_eq!(product.weight_kg, Some(1.0));
        assert_eq!(product.image_id.as_deref(), Some("file-9"));
    }

    #[test]
    fn test_product_without_image_or_price() {
        let json = r#"{"data": [{"id": "p-2", "name": "Carp"}]}"#;

        let envelope: Envelope<Vec<ProductData>> = serde_json::from_str(json).unwrap();
        let product = Product::from(envelope.data.into_iter().next().unwrap());

        assert_eq!(product.name, "Carp");
        assert_eq!(product.price, "");
        assert_eq!(product.image_id, None);
    }

    #[test]
    fn test_cart_item_from_payload() {
        let json = r#"{
            "id": "ci-7",
            "type": "cart_item",
            "product_id": "p-1",
            "name": "Salmon",
            "description": "Fresh atlantic salmon",
            "quantity": 5,
            "meta": {"display_price": {"with_tax": {
                "unit": {"amount": 1500, "formatted": "$15.00"},
                "value": {"amount": 7500, "formatted": "$75.00"}
            }}}
        }"#;

        let item = CartItem::from(serde_json::from_str::<CartItemData>(json).unwrap());

        assert_eq!(item.id, "ci-7");
        assert_eq!(item.quantity, 5);
        assert_eq!(item.unit_price, "$15.00");
        assert_eq!(item.value, "$75.00");
    }

    #[test]
    fn test_cart_item_request_shape() {
        let body = RequestEnvelope {
            data: CartItemRequest {
                id: "p-1",
                kind: "cart_item",
                quantity: 10,
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"data": {"id": "p-1", "type": "cart_item", "quantity": 10}})
        );
    }
}
