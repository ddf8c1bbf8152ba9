//! Conversation state for the shop dialogue.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::store::{KeyValueStore, StoreError};

/// Callback data of the "back to menu" button
pub const MENU_CALLBACK: &str = "menu";
/// Callback data of the "cart" button
pub const CART_CALLBACK: &str = "cart";
/// Callback data of the "checkout" button
pub const PAY_CALLBACK: &str = "pay";

/// Longest address accepted at checkout
pub const MAX_EMAIL_LENGTH: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern is valid");
}

/// What a user is currently doing, persisted per chat
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopState {
    /// Entry point, shows the product menu
    #[default]
    Start,
    /// Product menu is on screen
    HandleMenu,
    /// A product card with quantity buttons is on screen
    HandleDescription,
    /// Cart contents are on screen
    HandleCart,
    /// Checkout asked for an email address
    WaitingEmail,
}

impl ShopState {
    pub const ALL: [ShopState; 5] = [
        ShopState::Start,
        ShopState::HandleMenu,
        ShopState::HandleDescription,
        ShopState::HandleCart,
        ShopState::WaitingEmail,
    ];

    /// Name under which the state is persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            ShopState::Start => "START",
            ShopState::HandleMenu => "HANDLE_MENU",
            ShopState::HandleDescription => "HANDLE_DESCRIPTION",
            ShopState::HandleCart => "HANDLE_CART",
            ShopState::WaitingEmail => "WAITING_EMAIL",
        }
    }
}

impl fmt::Display for ShopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShopState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShopState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown state {s:?}"))
    }
}

/// An inline keyboard button the user pressed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Button {
    Menu,
    Cart,
    Pay,
    /// `<product_id>:<quantity>` on a product card
    Quantity { product_id: String, quantity: u32 },
    /// A product id in the menu, or a cart item id in the cart
    Item(String),
}

impl Button {
    /// Parse callback data, `None` when it is malformed
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        match data {
            "" => None,
            MENU_CALLBACK => Some(Button::Menu),
            CART_CALLBACK => Some(Button::Cart),
            PAY_CALLBACK => Some(Button::Pay),
            _ => match data.split_once(':') {
                Some((product_id, quantity)) => {
                    let quantity = quantity.trim().parse::<u32>().ok().filter(|q| *q > 0)?;
                    if product_id.is_empty() {
                        return None;
                    }
                    Some(Button::Quantity {
                        product_id: product_id.to_string(),
                        quantity,
                    })
                }
                None => Some(Button::Item(data.to_string())),
            },
        }
    }

    /// Callback data for a quantity button
    pub fn quantity_data(product_id: &str, quantity: u32) -> String {
        format!("{product_id}:{quantity}")
    }
}

/// What arrived from the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The `/start` command
    Start,
    /// Any other text message
    Text(String),
    /// An inline keyboard press, `None` when the callback data is malformed
    Button(Option<Button>),
}

impl Trigger {
    /// Classify a text message
    pub fn from_text(text: &str) -> Self {
        let command = text
            .split_whitespace()
            .next()
            .map(|word| word.split('@').next().unwrap_or(word));

        if command == Some("/start") {
            Trigger::Start
        } else {
            Trigger::Text(text.to_string())
        }
    }

    /// Classify callback data
    pub fn from_callback(data: &str) -> Self {
        Trigger::Button(Button::parse(data))
    }
}

/// Validates an email address typed at checkout
pub fn validate_email(email: &str) -> Result<String, &'static str> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err("too_long");
    }

    if !EMAIL_RE.is_match(trimmed) {
        return Err("invalid");
    }

    Ok(trimmed.to_string())
}

/// Key under which a chat's state is stored
pub fn state_key(chat_id: i64) -> String {
    format!("state:{chat_id}")
}

/// Persists [`ShopState`] per chat in the key-value store, without expiry
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current state of a chat, `None` for a chat never seen before
    pub async fn load(&self, chat_id: i64) -> Result<Option<ShopState>, StoreError> {
        let key = state_key(chat_id);
        match self.store.get(&key).await? {
            Some(raw) => raw
                .parse::<ShopState>()
                .map(Some)
                .map_err(|reason| StoreError::Corrupt { key, reason }),
            None => Ok(None),
        }
    }

    pub async fn save(&self, chat_id: i64, state: ShopState) -> Result<(), StoreError> {
        self.store.set(&state_key(chat_id), state.as_str()).await
    }
}
