//! Executes controller output against the Telegram Bot API

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use tracing::{debug, warn};

use super::controller::Outgoing;

/// Toast for a button press: the first notification's text, if any.
///
/// The press itself is answered by the callback handler before anything
/// else is sent, so a failed send cannot leave it unanswered.
pub fn callback_answer(actions: &[Outgoing]) -> Option<String> {
    actions
        .iter()
        .find_map(|action| match action {
            Outgoing::Notify(text) => Some(text.clone()),
            _ => None,
        })
        .flatten()
}

/// Send every message action in order; notifications are skipped.
///
/// Deleting an old keyboard message is best effort: Telegram refuses to
/// delete messages older than 48 hours, which must not fail the update.
pub async fn send_outgoing(bot: &Bot, chat_id: ChatId, actions: Vec<Outgoing>) -> Result<()> {
    for action in actions {
        match action {
            Outgoing::Text { text, keyboard } => {
                let request = bot.send_message(chat_id, text);
                match keyboard {
                    Some(keyboard) => request.reply_markup(keyboard).await?,
                    None => request.await?,
                };
            }
            Outgoing::Photo {
                url,
                caption,
                keyboard,
            } => {
                let sent = match reqwest::Url::parse(&url) {
                    Ok(parsed) => bot
                        .send_photo(chat_id, InputFile::url(parsed))
                        .caption(caption.clone())
                        .reply_markup(keyboard.clone())
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };

                if let Err(e) = sent {
                    warn!(user_id = %chat_id, url = %url, error = %e, "Failed to send product photo, falling back to text");
                    bot.send_message(chat_id, caption)
                        .reply_markup(keyboard)
                        .await?;
                }
            }
            Outgoing::Notify(_) => {}
            Outgoing::Delete(message_id) => {
                if let Err(e) = bot.delete_message(chat_id, MessageId(message_id)).await {
                    debug!(user_id = %chat_id, message_id, error = %e, "Could not delete message");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_answer_uses_first_notification() {
        let actions = vec![
            Outgoing::Notify(Some("Removed".to_string())),
            Outgoing::Text {
                text: "Cart".to_string(),
                keyboard: None,
            },
            Outgoing::Notify(Some("Second".to_string())),
        ];
        assert_eq!(callback_answer(&actions), Some("Removed".to_string()));
    }

    #[test]
    fn test_callback_answer_without_text() {
        assert_eq!(callback_answer(&[Outgoing::Notify(None)]), None);
        assert_eq!(callback_answer(&[Outgoing::Delete(3)]), None);
        assert_eq!(callback_answer(&[]), None);
    }
}
