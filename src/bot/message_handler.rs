//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::{debug, error};

// Import localization
use crate::localization::t_lang;

// Import dialogue types
use crate::dialogue::Trigger;

use super::controller::{Incoming, ShopController};
use super::sender::send_outgoing;

/// Name for the customer record: username when set, otherwise first name
pub fn customer_name(user: Option<&User>, chat_id: ChatId) -> String {
    user.and_then(|user| {
        user.username
            .clone()
            .or_else(|| Some(user.first_name.clone()).filter(|name| !name.trim().is_empty()))
    })
    .unwrap_or_else(|| format!("Telegram user {chat_id}"))
}

/// Convert a text message into controller input
pub fn incoming_from_message(msg: &Message) -> Option<Incoming> {
    let text = msg.text()?;

    Some(Incoming {
        chat_id: msg.chat.id.0,
        message_id: Some(msg.id.0),
        customer_name: customer_name(msg.from.as_ref(), msg.chat.id),
        language_code: msg.from.as_ref().and_then(|user| user.language_code.clone()),
        trigger: Trigger::from_text(text),
    })
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    controller: Arc<ShopController>,
) -> Result<()> {
    let Some(incoming) = incoming_from_message(&msg) else {
        debug!(user_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };

    debug!(user_id = %msg.chat.id, "Received text message from user");

    match controller.process(&incoming).await {
        Ok(actions) => send_outgoing(&bot, msg.chat.id, actions).await?,
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %format!("{e:#}"), "Failed to handle message");
            bot.send_message(
                msg.chat.id,
                t_lang("error-generic", incoming.language_code.as_deref()),
            )
            .await?;
        }
    }

    Ok(())
}
