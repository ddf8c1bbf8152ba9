//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQueryId;
use tracing::{debug, error, warn};

// Import localization
use crate::localization::t_lang;

// Import dialogue types
use crate::dialogue::Trigger;

use super::controller::{Incoming, ShopController};
use super::message_handler::customer_name;
use super::sender::{callback_answer, send_outgoing};

/// Convert a button press into controller input, `None` without a message
pub fn incoming_from_callback(q: &CallbackQuery) -> Option<Incoming> {
    let message = q.message.as_ref()?;
    let chat_id = message.chat().id;

    Some(Incoming {
        chat_id: chat_id.0,
        message_id: Some(message.id().0),
        customer_name: customer_name(Some(&q.from), chat_id),
        language_code: q.from.language_code.clone(),
        trigger: Trigger::from_callback(q.data.as_deref().unwrap_or("")),
    })
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<ShopController>,
) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    let Some(incoming) = incoming_from_callback(&q) else {
        // The keyboard message is gone, nothing to route
        answer(&bot, &q.id, None).await;
        return Ok(());
    };
    let chat_id = ChatId(incoming.chat_id);

    match controller.process(&incoming).await {
        Ok(actions) => {
            // Answer before sending: the button spins until it is answered
            answer(&bot, &q.id, callback_answer(&actions)).await;
            send_outgoing(&bot, chat_id, actions).await?;
        }
        Err(e) => {
            error!(user_id = %q.from.id, error = %format!("{e:#}"), "Failed to handle callback query");
            let text = t_lang("error-generic", incoming.language_code.as_deref());
            answer(&bot, &q.id, Some(text)).await;
        }
    }

    Ok(())
}

/// Answer a button press once, optionally with a toast
async fn answer(bot: &Bot, callback_id: &CallbackQueryId, text: Option<String>) {
    let request = bot.answer_callback_query(callback_id.clone());
    let sent = match text {
        Some(text) => request.text(text).await,
        None => request.await,
    };
    if let Err(e) = sent {
        warn!(error = %e, "Failed to answer callback query");
    }
}
