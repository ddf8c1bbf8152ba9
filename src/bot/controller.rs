//! Conversation controller: the per-chat shop state machine.
//!
//! Each update is routed by the chat's persisted [`ShopState`] to a handler.
//! The handler talks to the [`Storefront`], returns the messages to send and
//! the next state, and the controller persists that state. Sending is left
//! to the Telegram layer so the state machine can run without a bot.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::types::InlineKeyboardMarkup;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import commerce types
use crate::commerce::Storefront;

// Import dialogue types
use crate::dialogue::{validate_email, Button, ConversationStore, ShopState, Trigger};
use crate::store::{KeyValueStore, StoreError};

// Import UI builder functions
use super::ui_builder::{
    create_back_to_menu_keyboard, create_cart_keyboard, create_menu_keyboard,
    create_product_keyboard, format_cart, format_product_caption,
};

/// An update reduced to what the state machine needs
#[derive(Clone, Debug, PartialEq)]
pub struct Incoming {
    pub chat_id: i64,
    /// Message carrying the pressed keyboard, or the user's own text message
    pub message_id: Option<i32>,
    /// Name used for the customer record at checkout
    pub customer_name: String,
    pub language_code: Option<String>,
    pub trigger: Trigger,
}

impl Incoming {
    fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    fn cart_id(&self) -> String {
        self.chat_id.to_string()
    }

    /// Message with the pressed keyboard, deleted once it is replaced
    fn keyboard_message(&self) -> Option<i32> {
        match self.trigger {
            Trigger::Button(_) => self.message_id,
            _ => None,
        }
    }
}

/// Something to show the user
#[derive(Clone, Debug, PartialEq)]
pub enum Outgoing {
    Text {
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Photo {
        url: String,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    },
    /// Answer the pressed button, optionally with a toast
    Notify(Option<String>),
    /// Delete a message in the user's chat
    Delete(i32),
}

/// Handler output: what to send and where the conversation goes next
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub next_state: ShopState,
    pub actions: Vec<Outgoing>,
}

impl Reply {
    fn new(next_state: ShopState) -> Self {
        Self {
            next_state,
            actions: Vec::new(),
        }
    }

    fn push(mut self, action: Outgoing) -> Self {
        self.actions.push(action);
        self
    }

    fn delete(self, message_id: Option<i32>) -> Self {
        match message_id {
            Some(id) => self.push(Outgoing::Delete(id)),
            None => self,
        }
    }
}

/// The shop conversation state machine
#[derive(Clone)]
pub struct ShopController {
    storefront: Arc<dyn Storefront>,
    conversations: ConversationStore,
}

impl ShopController {
    pub fn new(storefront: Arc<dyn Storefront>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storefront,
            conversations: ConversationStore::new(store),
        }
    }

    /// Persisted state of a chat; unknown chats and unreadable values start over
    pub async fn current_state(&self, chat_id: i64) -> Result<ShopState> {
        match self.conversations.load(chat_id).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(ShopState::Start),
            Err(StoreError::Corrupt { key, reason }) => {
                warn!(user_id = chat_id, key = %key, reason = %reason, "Discarding unreadable conversation state");
                Ok(ShopState::Start)
            }
            Err(e) => Err(e).context("Failed to load conversation state"),
        }
    }

    /// Route one update, persist the next state and return what to send
    pub async fn process(&self, incoming: &Incoming) -> Result<Vec<Outgoing>> {
        let state = match incoming.trigger {
            Trigger::Start => ShopState::Start,
            _ => self.current_state(incoming.chat_id).await?,
        };
        debug!(user_id = incoming.chat_id, state = %state, trigger = ?incoming.trigger, "Dispatching update");

        let reply = self.handle(state, incoming).await?;

        self.conversations
            .save(incoming.chat_id, reply.next_state)
            .await
            .context("Failed to save conversation state")?;

        if state != reply.next_state {
            info!(
                user_id = incoming.chat_id,
                from = %state,
                to = %reply.next_state,
                "Conversation state changed"
            );
        }

        Ok(reply.actions)
    }

    async fn handle(&self, state: ShopState, incoming: &Incoming) -> Result<Reply> {
        let button = match &incoming.trigger {
            Trigger::Start => return self.display_menu(incoming).await,
            Trigger::Text(text) if state == ShopState::WaitingEmail => {
                return self.handle_email(incoming, text).await;
            }
            Trigger::Text(_) => return self.display_menu(incoming).await,
            Trigger::Button(None) => {
                debug!(user_id = incoming.chat_id, "Ignoring malformed callback data");
                return Ok(Reply::new(state));
            }
            Trigger::Button(Some(button)) => button,
        };

        match state {
            ShopState::Start => self.display_menu(incoming).await,
            ShopState::HandleMenu => self.handle_menu(incoming, button).await,
            ShopState::HandleDescription => self.handle_description(incoming, button).await,
            ShopState::HandleCart => self.handle_cart(incoming, button).await,
            ShopState::WaitingEmail => match button {
                Button::Menu => self.display_menu(incoming).await,
                _ => Ok(Reply::new(state)),
            },
        }
    }

    async fn display_menu(&self, incoming: &Incoming) -> Result<Reply> {
        let products = self
            .storefront
            .products()
            .await
            .context("Failed to load products")?;

        Ok(Reply::new(ShopState::HandleMenu)
            .push(Outgoing::Text {
                text: t_lang("menu-prompt", incoming.lang()),
                keyboard: Some(create_menu_keyboard(&products, incoming.lang())),
            })
            .delete(incoming.keyboard_message()))
    }

    async fn display_cart(&self, incoming: &Incoming) -> Result<Reply> {
        let cart = self
            .storefront
            .cart(&incoming.cart_id())
            .await
            .context("Failed to load cart")?;

        Ok(Reply::new(ShopState::HandleCart)
            .push(Outgoing::Text {
                text: format_cart(&cart, incoming.lang()),
                keyboard: Some(create_cart_keyboard(&cart, incoming.lang())),
            })
            .delete(incoming.keyboard_message()))
    }

    async fn display_product(&self, incoming: &Incoming, product_id: &str) -> Result<Reply> {
        let product = self
            .storefront
            .product(product_id)
            .await
            .with_context(|| format!("Failed to load product {product_id}"))?;

        let caption = format_product_caption(&product, incoming.lang());
        let keyboard = create_product_keyboard(&product.id, incoming.lang());

        let image_url = match &product.image_id {
            Some(file_id) => match self.storefront.image_url(file_id).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(product_id, error = %e, "Failed to resolve product image, sending text only");
                    None
                }
            },
            None => None,
        };

        let card = match image_url {
            Some(url) => Outgoing::Photo {
                url,
                caption,
                keyboard,
            },
            None => Outgoing::Text {
                text: caption,
                keyboard: Some(keyboard),
            },
        };

        Ok(Reply::new(ShopState::HandleDescription)
            .push(card)
            .delete(incoming.keyboard_message()))
    }

    async fn handle_menu(&self, incoming: &Incoming, button: &Button) -> Result<Reply> {
        match button {
            Button::Cart => self.display_cart(incoming).await,
            Button::Item(product_id) => self.display_product(incoming, product_id).await,
            Button::Menu => self.display_menu(incoming).await,
            Button::Pay | Button::Quantity { .. } => Ok(Reply::new(ShopState::HandleMenu)),
        }
    }

    async fn handle_description(&self, incoming: &Incoming, button: &Button) -> Result<Reply> {
        match button {
            Button::Menu => self.display_menu(incoming).await,
            Button::Cart => self.display_cart(incoming).await,
            Button::Quantity {
                product_id,
                quantity,
            } => {
                self.storefront
                    .add_to_cart(&incoming.cart_id(), product_id, *quantity)
                    .await
                    .with_context(|| format!("Failed to add {product_id} to cart"))?;

                info!(user_id = incoming.chat_id, product_id = %product_id, quantity, "Added product to cart");

                Ok(Reply::new(ShopState::HandleDescription).push(Outgoing::Notify(Some(
                    t_lang("added-to-cart", incoming.lang()),
                ))))
            }
            // A button from an older menu message
            Button::Item(product_id) => self.display_product(incoming, product_id).await,
            Button::Pay => Ok(Reply::new(ShopState::HandleDescription)),
        }
    }

    async fn handle_cart(&self, incoming: &Incoming, button: &Button) -> Result<Reply> {
        match button {
            Button::Menu => self.display_menu(incoming).await,
            Button::Pay => Ok(Reply::new(ShopState::WaitingEmail)
                .push(Outgoing::Text {
                    text: t_lang("email-prompt", incoming.lang()),
                    keyboard: None,
                })
                .delete(incoming.keyboard_message())),
            Button::Item(item_id) => {
                let cart_id = incoming.cart_id();
                let cart = self
                    .storefront
                    .cart(&cart_id)
                    .await
                    .context("Failed to load cart")?;

                // Buttons of an outdated cart message may point at removed lines
                let notice = if cart.items.iter().any(|item| &item.id == item_id) {
                    self.storefront
                        .remove_from_cart(&cart_id, item_id)
                        .await
                        .with_context(|| format!("Failed to remove {item_id} from cart"))?;
                    info!(user_id = incoming.chat_id, item_id = %item_id, "Removed item from cart");
                    Some(t_lang("removed-from-cart", incoming.lang()))
                } else {
                    debug!(user_id = incoming.chat_id, item_id = %item_id, "Cart item already gone");
                    None
                };

                let reply = self.display_cart(incoming).await?;
                let mut actions = vec![Outgoing::Notify(notice)];
                actions.extend(reply.actions);
                Ok(Reply {
                    next_state: reply.next_state,
                    actions,
                })
            }
            Button::Cart => self.display_cart(incoming).await,
            Button::Quantity { .. } => Ok(Reply::new(ShopState::HandleCart)),
        }
    }

    async fn handle_email(&self, incoming: &Incoming, text: &str) -> Result<Reply> {
        // The bot's latest prompt or notice is the message right before the user's answer
        let prompt_id = incoming.message_id.filter(|id| *id > 1).map(|id| id - 1);

        let email = match validate_email(text) {
            Ok(email) => email,
            Err(reason) => {
                debug!(user_id = incoming.chat_id, reason, "Rejected email address");
                // Replace the previous prompt so only one stays on screen
                return Ok(Reply::new(ShopState::WaitingEmail)
                    .push(Outgoing::Text {
                        text: t_lang("email-invalid", incoming.lang()),
                        keyboard: None,
                    })
                    .delete(prompt_id));
            }
        };

        self.storefront
            .create_customer(&incoming.customer_name, &email)
            .await
            .context("Failed to create customer")?;

        info!(user_id = incoming.chat_id, "Checkout completed");

        Ok(Reply::new(ShopState::HandleCart)
            .push(Outgoing::Text {
                text: t_args_lang("order-created", &[("email", &email)], incoming.lang()),
                keyboard: Some(create_back_to_menu_keyboard(incoming.lang())),
            })
            .delete(prompt_id))
    }
}
