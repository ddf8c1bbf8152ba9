//! Forwards application log records to an operator Telegram chat.
//!
//! [`TelegramLogLayer`] is a `tracing` layer that only formats and queues
//! records; a background task owns the bot and does the sending, so logging
//! never blocks on the network. Records above the layer's level are dropped
//! unless they use [`OPERATOR_TARGET`], and a full queue drops records
//! instead of growing.

use chrono::Local;
use std::fmt::Write as _;
use teloxide::prelude::*;
use teloxide::RequestError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Telegram rejects messages longer than this
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Only records emitted by this crate are forwarded
pub const FORWARDED_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Records with this target reach the operator chat at any level
pub const OPERATOR_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::operator");

/// Records waiting for the forwarder; further records are dropped
pub const QUEUE_CAPACITY: usize = 64;

/// Attempts per record when Telegram asks to slow down
const MAX_SEND_ATTEMPTS: u32 = 3;

/// Target used by the forwarder itself, never forwarded
const FORWARDER_TARGET: &str = "telegram_log_forwarder";

pub struct TelegramLogLayer {
    sender: mpsc::Sender<String>,
    max_level: Level,
}

impl TelegramLogLayer {
    /// Layer forwarding records at `max_level` or more severe, plus the queue it fills
    pub fn new(max_level: Level) -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(max_level, QUEUE_CAPACITY)
    }

    pub fn with_capacity(max_level: Level, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender, max_level }, receiver)
    }

    fn accepts(&self, level: &Level, target: &str) -> bool {
        if target == OPERATOR_TARGET {
            return true;
        }
        *level <= self.max_level && is_forwarded_target(target)
    }
}

fn is_forwarded_target(target: &str) -> bool {
    target == FORWARDED_TARGET
        || target
            .strip_prefix(FORWARDED_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<S> Layer<S> for TelegramLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.accepts(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let record = format_record(
            &timestamp,
            metadata.level(),
            metadata.target(),
            &visitor.message,
            &visitor.fields,
        );

        // Full or closed queue: the record still reaches stdout
        let _ = self.sender.try_send(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

/// `<time> - <target> - <LEVEL> - <message> key=value ...`, cut to Telegram's limit
pub fn format_record(
    timestamp: &str,
    level: &Level,
    target: &str,
    message: &str,
    fields: &[(String, String)],
) -> String {
    let mut record = format!("{timestamp} - {target} - {level} - {message}");
    for (name, value) in fields {
        let _ = write!(record, " {name}={value}");
    }

    if record.chars().count() > MAX_MESSAGE_CHARS {
        record = record.chars().take(MAX_MESSAGE_CHARS - 3).collect();
        record.push_str("...");
    }
    record
}

/// Drain queued records into the operator chat until every sender is dropped
pub fn spawn_forwarder(
    bot: Bot,
    chat_id: ChatId,
    mut receiver: mpsc::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = receiver.recv().await {
            forward_record(&bot, chat_id, record).await;
        }
    })
}

/// Send one record, waiting out Telegram's flood control
async fn forward_record(bot: &Bot, chat_id: ChatId, record: String) {
    for attempt in 1..=MAX_SEND_ATTEMPTS {
        match bot.send_message(chat_id, record.clone()).await {
            Ok(_) => return,
            Err(RequestError::RetryAfter(wait)) if attempt < MAX_SEND_ATTEMPTS => {
                tracing::debug!(target: FORWARDER_TARGET, wait_secs = wait.seconds(), "Log chat rate limited");
                tokio::time::sleep(wait.duration()).await;
            }
            Err(e) => {
                tracing::debug!(target: FORWARDER_TARGET, error = %e, "Failed to forward log record");
                return;
            }
        }
    }
}
